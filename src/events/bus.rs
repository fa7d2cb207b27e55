//! Per-map broadcast bus connecting the engines to WebSocket fan-out.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use crate::events::DomainEvent;

/// In-process publish/subscribe channels, one topic per map.
///
/// Publish order is preserved per topic per subscriber. Each subscriber has
/// a bounded buffer; a receiver that lags past it observes
/// `RecvError::Lagged` and is expected to drop the client, which re-syncs
/// over HTTP on reconnect. Nothing survives a restart.
pub struct EventBus {
    topics: DashMap<Uuid, broadcast::Sender<DomainEvent>>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity,
        }
    }

    /// Publish an event to its map topic. Best-effort: with no subscribers
    /// the event is dropped, and the topic entry is reclaimed.
    pub fn publish(&self, event: DomainEvent) {
        let map_id = event.map_id();
        let Some(tx) = self.topics.get(&map_id) else {
            return;
        };

        if tx.send(event).is_err() {
            // All receivers disconnected since the topic was created
            drop(tx);
            self.topics
                .remove_if(&map_id, |_, tx| tx.receiver_count() == 0);
            trace!(map_id = %map_id, "dropped event for map with no subscribers");
        }
    }

    /// Subscribe to a map topic, creating it on first use.
    pub fn subscribe(&self, map_id: Uuid) -> broadcast::Receiver<DomainEvent> {
        self.topics
            .entry(map_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of live subscribers on a map topic.
    pub fn subscriber_count(&self, map_id: Uuid) -> usize {
        self.topics
            .get(&map_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

/// A shared event bus instance.
pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::data::models::LatLng;

    fn moved_event(map_id: Uuid) -> DomainEvent {
        DomainEvent::AvatarMoved {
            session_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            map_id,
            position: LatLng { lat: 1.0, lng: 2.0 },
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_events_in_order() {
        let bus = EventBus::new(16);
        let map_id = Uuid::new_v4();
        let mut rx = bus.subscribe(map_id);

        bus.publish(moved_event(map_id));
        bus.publish(moved_event(map_id));

        assert!(matches!(
            rx.recv().await,
            Ok(DomainEvent::AvatarMoved { .. })
        ));
        assert!(matches!(
            rx.recv().await,
            Ok(DomainEvent::AvatarMoved { .. })
        ));
    }

    #[tokio::test]
    async fn topics_are_isolated_per_map() {
        let bus = EventBus::new(16);
        let map_a = Uuid::new_v4();
        let map_b = Uuid::new_v4();
        let mut rx_a = bus.subscribe(map_a);
        let _rx_b = bus.subscribe(map_b);

        bus.publish(moved_event(map_b));

        assert!(matches!(
            rx_a.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let bus = EventBus::new(16);
        // No subscribe() beforehand; must not panic or leak a topic
        bus.publish(moved_event(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn slow_subscriber_observes_lag() {
        let bus = EventBus::new(2);
        let map_id = Uuid::new_v4();
        let mut rx = bus.subscribe(map_id);

        for _ in 0..4 {
            bus.publish(moved_event(map_id));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }
}
