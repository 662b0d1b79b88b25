//! Domain event system: lets observers follow context assembly without
//! coupling to the assembler.
//!
//! Events are published when something interesting happens to a
//! conversation's context. Subscribers (a status bar, a debug log, tests)
//! filter for what they care about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All context-assembly events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ContextEvent {
    /// A build finished and its snapshot was stored
    ContextBuilt {
        conversation_id: String,
        references: usize,
        token_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A build finished after a newer one started; its result was discarded
    RebuildSuperseded {
        conversation_id: String,
        operation: u64,
        timestamp: DateTime<Utc>,
    },

    /// Stale references were removed from a conversation
    ReferencesPruned {
        conversation_id: String,
        document_ids: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// The tracked working document changed
    WorkingDocumentChanged {
        previous: Option<String>,
        current: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Context usage crossed a warning threshold for the first time this session
    UsageThresholdCrossed {
        conversation_id: String,
        level: String,
        usage_percentage: f64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for context events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<ContextEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: ContextEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ContextEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(ContextEvent::ContextBuilt {
            conversation_id: "Doc1".into(),
            references: 2,
            token_count: 120,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            ContextEvent::ContextBuilt {
                conversation_id,
                references,
                ..
            } => {
                assert_eq!(conversation_id, "Doc1");
                assert_eq!(*references, 2);
            }
            _ => panic!("Expected ContextBuilt event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(ContextEvent::WorkingDocumentChanged {
            previous: None,
            current: Some("Doc1".into()),
            timestamp: Utc::now(),
        });
    }
}
