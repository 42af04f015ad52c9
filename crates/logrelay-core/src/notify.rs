//! Transient user-facing messages.
//!
//! The auth flow reports progress through a `Notifier`; how a notice is
//! displayed (toast, status line, log line) belongs to the front end.

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Info,
    Warning,
    Error,
}

impl NoticeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NoticeKind::Success => "success",
            NoticeKind::Info => "info",
            NoticeKind::Warning => "warning",
            NoticeKind::Error => "error",
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, message: &str);
}

/// Notifier that only writes to the tracing log. Used by the one-shot CLI
/// commands where there is no UI to show a toast.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Error => error!(kind = kind.label(), "{}", message),
            NoticeKind::Warning => warn!(kind = kind.label(), "{}", message),
            NoticeKind::Success | NoticeKind::Info => info!(kind = kind.label(), "{}", message),
        }
    }
}
