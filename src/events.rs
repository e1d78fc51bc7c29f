use crate::error::EventBusError;
use crate::session::SessionState;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// Events published by the acquisition loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureEvent {
    /// Status line text changed
    StatusChanged { status: String },
    /// Number of frames in the capture buffer changed
    CaptureCountChanged { count: usize },
    /// Interval control was normalized at start
    IntervalRewritten { interval_ms: u64 },
    /// A new preview frame is on display
    PreviewUpdated {
        frame_id: u64,
        handle_id: u64,
        bytes: usize,
    },
    /// A still was appended to the capture buffer
    FrameCaptured { frame_id: u64, count: usize },
    /// A fetch or transform failed and the frame was dropped
    FrameDropped { frame_id: u64, reason: String },
    /// An archive was handed to the download surface
    ArchiveExported {
        filename: String,
        entries: usize,
        location: String,
    },
    SessionStateChanged {
        from: SessionState,
        to: SessionState,
    },
    ShutdownRequested { reason: String },
}

impl CaptureEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            CaptureEvent::StatusChanged { status } => format!("Status: {}", status),
            CaptureEvent::CaptureCountChanged { count } => format!("Captured: {}", count),
            CaptureEvent::IntervalRewritten { interval_ms } => {
                format!("Interval set to {} ms", interval_ms)
            }
            CaptureEvent::PreviewUpdated {
                frame_id, bytes, ..
            } => format!("Preview frame {} ({} bytes)", frame_id, bytes),
            CaptureEvent::FrameCaptured { frame_id, count } => {
                format!("Frame {} captured ({} total)", frame_id, count)
            }
            CaptureEvent::FrameDropped { frame_id, reason } => {
                format!("Frame {} dropped: {}", frame_id, reason)
            }
            CaptureEvent::ArchiveExported {
                filename, entries, ..
            } => format!("Exported {} ({} frames)", filename, entries),
            CaptureEvent::SessionStateChanged { from, to } => {
                format!("Session {} -> {}", from, to)
            }
            CaptureEvent::ShutdownRequested { reason } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            CaptureEvent::StatusChanged { .. } => "status_changed",
            CaptureEvent::CaptureCountChanged { .. } => "capture_count_changed",
            CaptureEvent::IntervalRewritten { .. } => "interval_rewritten",
            CaptureEvent::PreviewUpdated { .. } => "preview_updated",
            CaptureEvent::FrameCaptured { .. } => "frame_captured",
            CaptureEvent::FrameDropped { .. } => "frame_dropped",
            CaptureEvent::ArchiveExported { .. } => "archive_exported",
            CaptureEvent::SessionStateChanged { .. } => "session_state_changed",
            CaptureEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CaptureEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: CaptureEvent) -> Result<usize, EventBusError> {
        match &event {
            CaptureEvent::ArchiveExported {
                filename, location, ..
            } => {
                info!("Archive {} ready at {}", filename, location);
            }
            CaptureEvent::ShutdownRequested { reason } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Publish, treating a bus with no subscribers as fine
    pub fn emit(&self, event: CaptureEvent) {
        if let Err(e) = self.publish(event) {
            trace!("Event not delivered: {}", e);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    pub fn matches(&self, event: &CaptureEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Event receiver that skips events outside its filter
pub struct EventReceiver {
    receiver: broadcast::Receiver<CaptureEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<CaptureEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<CaptureEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus
            .publish(CaptureEvent::CaptureCountChanged { count: 3 })
            .unwrap();
        assert_eq!(subscriber_count, 1);

        let received = receiver.recv().await.unwrap();
        assert_eq!(received, CaptureEvent::CaptureCountChanged { count: 3 });
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus
            .publish(CaptureEvent::StatusChanged {
                status: "Recording...".to_string(),
            })
            .unwrap();

        let _ = timeout(Duration::from_millis(100), receiver1.recv())
            .await
            .unwrap()
            .unwrap();
        let _ = timeout(Duration::from_millis(100), receiver2.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_publish_without_subscribers() {
        let event_bus = EventBus::new(10);
        assert!(!event_bus.has_subscribers());
        assert!(event_bus
            .publish(CaptureEvent::CaptureCountChanged { count: 0 })
            .is_err());

        // emit swallows the missing-subscriber case
        event_bus.emit(CaptureEvent::CaptureCountChanged { count: 0 });
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let filter = EventFilter::EventTypes(vec!["archive_exported"]);
        let mut receiver = EventReceiver::new(event_bus.subscribe(), filter, "test".to_string());

        event_bus.emit(CaptureEvent::FrameCaptured {
            frame_id: 1,
            count: 1,
        });
        event_bus.emit(CaptureEvent::ArchiveExported {
            filename: "tm_captures_1.zip".to_string(),
            entries: 1,
            location: "./downloads/tm_captures_1.zip".to_string(),
        });

        let received = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event_type(), "archive_exported");
    }

    #[tokio::test]
    async fn test_lagged_receiver_reports_skipped() {
        let event_bus = EventBus::new(2);
        let mut receiver = EventReceiver::new(
            event_bus.subscribe(),
            EventFilter::All,
            "slow".to_string(),
        );

        for count in 0..5 {
            event_bus.emit(CaptureEvent::CaptureCountChanged { count });
        }

        assert!(matches!(
            receiver.recv().await,
            Err(EventBusError::Lagged { skipped: 3 })
        ));
    }

    #[test]
    fn test_event_descriptions() {
        let event = CaptureEvent::SessionStateChanged {
            from: SessionState::Idle,
            to: SessionState::Recording,
        };
        assert_eq!(event.description(), "Session idle -> recording");
        assert_eq!(event.event_type(), "session_state_changed");

        let dropped = CaptureEvent::FrameDropped {
            frame_id: 2,
            reason: "Camera returned an empty frame".to_string(),
        };
        assert_eq!(
            dropped.description(),
            "Frame 2 dropped: Camera returned an empty frame"
        );
    }

    #[test]
    fn test_event_json_shape() {
        let event = CaptureEvent::IntervalRewritten { interval_ms: 200 };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"IntervalRewritten":{"interval_ms":200}}"#);

        let back: CaptureEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
