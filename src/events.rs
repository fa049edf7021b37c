//! Event stream published to the UI collaborator
//!
//! Status, progress and log events are advisory. Sending never blocks and
//! never fails the operation that produced the event.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config;

/// Visual category of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Loading,
    Success,
    Error,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FlasherEvent {
    Status { message: String, kind: StatusKind },
    Progress { percent: u8 },
    LogLine { text: String },
}

/// Broadcast publisher for [`FlasherEvent`]s
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<FlasherEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(config::logging::EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlasherEvent> {
        self.sender.subscribe()
    }

    fn publish(&self, event: FlasherEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }

    pub fn status(&self, message: impl Into<String>, kind: StatusKind) {
        self.publish(FlasherEvent::Status {
            message: message.into(),
            kind,
        });
    }

    pub fn progress(&self, percent: u8) {
        self.publish(FlasherEvent::Progress {
            percent: percent.min(100),
        });
    }

    pub fn log_line(&self, text: impl Into<String>) {
        self.publish(FlasherEvent::LogLine { text: text.into() });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.status("Loading ISO list...", StatusKind::Loading);
        bus.progress(10);
    }

    #[test]
    fn test_progress_is_clamped() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.progress(250);
        assert_eq!(rx.try_recv().unwrap(), FlasherEvent::Progress { percent: 100 });
    }

    #[test]
    fn test_event_serialization() {
        let event = FlasherEvent::Status {
            message: "Found 2 ISO images".to_string(),
            kind: StatusKind::Success,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["kind"], "success");
    }
}
