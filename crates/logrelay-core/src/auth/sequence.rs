use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::notify::{NoticeKind, Notifier};

/// Returned when a sequence is cancelled between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// A named, ordered run of notify → wait → act stages.
///
/// Each stage is traced with the sequence name, and every wait races the
/// cancellation token, so a cancelled flow stops at the next stage
/// boundary instead of firing a stale action.
pub struct Sequence {
    name: &'static str,
    notifier: Arc<dyn Notifier>,
    cancel: CancellationToken,
}

impl Sequence {
    pub fn new(name: &'static str, notifier: Arc<dyn Notifier>, cancel: CancellationToken) -> Self {
        Self {
            name,
            notifier,
            cancel,
        }
    }

    pub fn notify(&self, kind: NoticeKind, message: &str) -> Result<(), Cancelled> {
        self.ensure_live()?;
        debug!(sequence = self.name, stage = "notify", kind = kind.label(), "{}", message);
        self.notifier.notify(kind, message);
        Ok(())
    }

    pub async fn wait(&self, stage: &'static str, delay: Duration) -> Result<(), Cancelled> {
        self.ensure_live()?;
        debug!(sequence = self.name, stage, delay_ms = delay.as_millis() as u64, "waiting");
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Mark the start of an action stage.
    pub fn act(&self, stage: &'static str) -> Result<(), Cancelled> {
        self.ensure_live()?;
        debug!(sequence = self.name, stage, "acting");
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), Cancelled> {
        if self.cancel.is_cancelled() {
            debug!(sequence = self.name, "cancelled");
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
