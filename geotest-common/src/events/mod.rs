//! Event types for the GeoTest event system
//!
//! Provides analysis progress events and the EventBus that carries them to
//! SSE subscribers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// GeoTest event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// Provider names are carried as display strings so this crate stays
/// independent of the analyzer's provider registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoEvent {
    /// An analysis run was dispatched
    AnalysisStarted {
        /// Per-run identifier (one per orchestrator invocation)
        run_id: Uuid,
        /// Target URL
        url: String,
        /// Providers taking part in the consensus
        providers: Vec<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Synthetic progress tick for one provider
    ///
    /// Purely cosmetic. Values stay at or below 95 until the provider call
    /// settles, then jump to 100.
    ProviderProgress {
        run_id: Uuid,
        provider: String,
        /// Percent complete (0-100)
        percent: u8,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One provider call settled
    ProviderCompleted {
        run_id: Uuid,
        provider: String,
        success: bool,
        /// Score reported by the provider (0 on failure)
        score: u8,
        elapsed_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The full analysis finished (live or fallback)
    AnalysisCompleted {
        run_id: Uuid,
        url: String,
        /// Consensus score, `None` when the fallback report was used
        final_score: Option<u8>,
        fallback: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl GeoEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            GeoEvent::AnalysisStarted { .. } => "AnalysisStarted",
            GeoEvent::ProviderProgress { .. } => "ProviderProgress",
            GeoEvent::ProviderCompleted { .. } => "ProviderCompleted",
            GeoEvent::AnalysisCompleted { .. } => "AnalysisCompleted",
        }
    }

    /// Run this event belongs to
    pub fn run_id(&self) -> Uuid {
        match self {
            GeoEvent::AnalysisStarted { run_id, .. }
            | GeoEvent::ProviderProgress { run_id, .. }
            | GeoEvent::ProviderCompleted { run_id, .. }
            | GeoEvent::AnalysisCompleted { run_id, .. } => *run_id,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use geotest_common::events::{EventBus, GeoEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(GeoEvent::ProviderProgress {
///     run_id: uuid::Uuid::new_v4(),
///     provider: "OpenAI".to_string(),
///     percent: 42,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GeoEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<GeoEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: GeoEvent) -> Result<usize, broadcast::error::SendError<GeoEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: GeoEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(percent: u8) -> GeoEvent {
        GeoEvent::ProviderProgress {
            run_id: Uuid::new_v4(),
            provider: "Anthropic".to_string(),
            percent,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        assert!(bus.emit(progress(10)).is_err());
        // Lossy variant must not panic
        bus.emit_lossy(progress(10));
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(progress(55)).unwrap();

        match rx.recv().await.unwrap() {
            GeoEvent::ProviderProgress { percent, provider, .. } => {
                assert_eq!(percent, 55);
                assert_eq!(provider, "Anthropic");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let json = serde_json::to_value(progress(5)).unwrap();
        assert_eq!(json["type"], "ProviderProgress");
        assert_eq!(json["percent"], 5);
        assert_eq!(progress(5).event_type(), "ProviderProgress");
    }
}
