//! Notification fan-out to connected observers.
//!
//! Fire-and-forget broadcast over a tokio channel. The transport that
//! carries events to actual clients (websocket, SSE, ...) subscribes
//! here; a missing or lagging observer never blocks the pipeline.

use desk_common::events::DeskEvent;
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 64;

/// Handle for broadcasting pipeline events.
#[derive(Clone)]
pub struct NotificationHub {
    tx: broadcast::Sender<DeskEvent>,
}

impl NotificationHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Broadcast an event to all current observers. A send error just
    /// means nobody is listening.
    pub fn broadcast(&self, event: DeskEvent) {
        match self.tx.send(event) {
            Ok(n) => debug!("Broadcast delivered to {} observers", n),
            Err(_) => debug!("Broadcast dropped, no observers connected"),
        }
    }

    /// Subscribe a new observer.
    pub fn subscribe(&self) -> broadcast::Receiver<DeskEvent> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use desk_common::events::DeskEventType;

    #[tokio::test]
    async fn test_broadcast_reaches_all_observers() {
        let hub = NotificationHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.broadcast(DeskEvent::timeline_update(vec![]));

        assert_eq!(a.recv().await.unwrap().event_type, DeskEventType::TimelineUpdate);
        assert_eq!(b.recv().await.unwrap().event_type, DeskEventType::TimelineUpdate);
    }

    #[test]
    fn test_broadcast_without_observers_is_harmless() {
        let hub = NotificationHub::new();
        hub.broadcast(DeskEvent::pending_tickets_update(vec![]));
        assert_eq!(hub.observer_count(), 0);
    }
}
