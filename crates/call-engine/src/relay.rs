//! Real-time event fan-out.
//!
//! A thin wrapper over a broadcast channel. The relay is purely a
//! notification mechanism: every caller persists authoritative state
//! before broadcasting, and nothing is buffered or replayed; a client
//! that reconnects resyncs from request/response reads.

use tokio::sync::broadcast;

use dialwave_relay_core::ChannelEvent;

/// Fan-out channel for normalized events.
#[derive(Debug, Clone)]
pub struct EventRelay {
    tx: broadcast::Sender<ChannelEvent>,
}

impl EventRelay {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to the event stream from now on; nothing is replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.tx.subscribe()
    }

    /// Broadcast an event. Having no subscribers is not an error.
    pub fn broadcast(&self, event: ChannelEvent) {
        tracing::debug!(?event, "relaying event");
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dialwave_relay_core::ConferenceSid;

    #[tokio::test]
    async fn test_no_subscribers_is_fine() {
        let relay = EventRelay::new(16);
        relay.broadcast(ChannelEvent::ConferenceStarted {
            conference_sid: ConferenceSid::new("conf_1"),
            timestamp: Utc::now(),
        });
    }

    #[tokio::test]
    async fn test_subscription_starts_now_not_from_history() {
        let relay = EventRelay::new(16);
        relay.broadcast(ChannelEvent::ConferenceStarted {
            conference_sid: ConferenceSid::new("conf_before"),
            timestamp: Utc::now(),
        });

        let mut rx = relay.subscribe();
        relay.broadcast(ChannelEvent::ConferenceStarted {
            conference_sid: ConferenceSid::new("conf_after"),
            timestamp: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            ChannelEvent::ConferenceStarted { conference_sid, .. } => {
                assert_eq!(conference_sid.as_str(), "conf_after");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }
}
