//! Bridges core callbacks onto the UI thread.
//!
//! The core calls `Notifier` / `ViewBinding` from background tasks; the
//! bridge turns each call into a `UiEvent` that the main loop drains
//! between frames.

use logrelay_core::{Destination, NoticeKind, Notifier, ViewBinding};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Notice(NoticeKind, String),
    Reveal,
    Navigate(Destination),
    Log(String),
}

#[derive(Clone)]
pub struct ChannelBridge {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelBridge {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            debug!("UI closed, dropping event");
        }
    }
}

impl Notifier for ChannelBridge {
    fn notify(&self, kind: NoticeKind, message: &str) {
        self.send(UiEvent::Notice(kind, message.to_string()));
    }
}

impl ViewBinding for ChannelBridge {
    fn reveal(&self) {
        self.send(UiEvent::Reveal);
    }

    fn navigate(&self, destination: Destination) {
        self.send(UiEvent::Navigate(destination));
    }

    fn render_log(&self, text: &str) {
        self.send(UiEvent::Log(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calls_become_events_in_order() {
        let (bridge, mut rx) = ChannelBridge::new();
        bridge.notify(NoticeKind::Info, "Signing out...");
        bridge.reveal();
        bridge.navigate(Destination::Login);
        bridge.render_log("abc");

        assert_eq!(rx.try_recv().unwrap(), UiEvent::Notice(NoticeKind::Info, "Signing out...".to_string()));
        assert_eq!(rx.try_recv().unwrap(), UiEvent::Reveal);
        assert_eq!(rx.try_recv().unwrap(), UiEvent::Navigate(Destination::Login));
        assert_eq!(rx.try_recv().unwrap(), UiEvent::Log("abc".to_string()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (bridge, rx) = ChannelBridge::new();
        drop(rx);
        bridge.render_log("nobody listening");
    }
}
