//! TTL-backed presence records for active sessions.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::data::models::LatLng;

/// The short-lived record of a session's current position and activity.
#[derive(Debug, Clone)]
pub struct PresenceRecord {
    pub user_id: Uuid,
    pub map_id: Uuid,
    pub position: LatLng,
    pub last_active: DateTime<Utc>,
    pub current_poi: Option<Uuid>,
}

#[derive(Debug, Clone)]
struct Entry {
    record: PresenceRecord,
    expires_at: Instant,
}

/// In-memory presence store keyed by session id.
///
/// Entries expire after the configured TTL; heartbeat and movement refresh
/// it. Expired entries are ignored by reads and dropped by the sweep.
#[derive(Clone)]
pub struct PresenceCache {
    entries: Arc<DashMap<Uuid, Entry>>,
    ttl: Duration,
}

impl PresenceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Insert or replace the record for a session, resetting its TTL.
    pub fn set(&self, session_id: Uuid, record: PresenceRecord) {
        self.entries.insert(
            session_id,
            Entry {
                record,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Fetch the record for a session, if present and not expired.
    pub fn get(&self, session_id: Uuid) -> Option<PresenceRecord> {
        let entry = self.entries.get(&session_id)?;
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(&session_id);
            return None;
        }
        Some(entry.record.clone())
    }

    /// Update the avatar position, bumping `last_active` and the TTL.
    pub fn update_position(&self, session_id: Uuid, position: LatLng) {
        if let Some(mut entry) = self.entries.get_mut(&session_id) {
            entry.record.position = position;
            entry.record.last_active = Utc::now();
            entry.expires_at = Instant::now() + self.ttl;
        }
    }

    /// Refresh the TTL without touching the position.
    pub fn heartbeat(&self, session_id: Uuid) {
        if let Some(mut entry) = self.entries.get_mut(&session_id) {
            entry.record.last_active = Utc::now();
            entry.expires_at = Instant::now() + self.ttl;
        }
    }

    /// Record which POI the session's user is currently in.
    pub fn set_current_poi(&self, session_id: Uuid, poi_id: Option<Uuid>) {
        if let Some(mut entry) = self.entries.get_mut(&session_id) {
            entry.record.current_poi = poi_id;
        }
    }

    /// Clear `current_poi` on every session pointing at a deleted POI.
    pub fn clear_poi(&self, poi_id: Uuid) {
        for mut entry in self.entries.iter_mut() {
            if entry.record.current_poi == Some(poi_id) {
                entry.record.current_poi = None;
            }
        }
    }

    /// Drop the record for a session.
    pub fn remove(&self, session_id: Uuid) {
        self.entries.remove(&session_id);
    }

    /// Snapshot the live records for one map.
    pub fn list_by_map(&self, map_id: Uuid) -> Vec<(Uuid, PresenceRecord)> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.record.map_id == map_id && entry.expires_at > now)
            .map(|entry| (*entry.key(), entry.record.clone()))
            .collect()
    }

    /// Drop all expired entries. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(map_id: Uuid) -> PresenceRecord {
        PresenceRecord {
            user_id: Uuid::new_v4(),
            map_id,
            position: LatLng { lat: 0.0, lng: 0.0 },
            last_active: Utc::now(),
            current_poi: None,
        }
    }

    #[test]
    fn set_get_remove_roundtrip() {
        let cache = PresenceCache::new(Duration::from_secs(60));
        let sid = Uuid::new_v4();
        let map_id = Uuid::new_v4();

        cache.set(sid, record(map_id));
        assert!(cache.get(sid).is_some());

        cache.remove(sid);
        assert!(cache.get(sid).is_none());
    }

    #[test]
    fn expired_entries_are_invisible_and_swept() {
        let cache = PresenceCache::new(Duration::from_millis(0));
        let sid = Uuid::new_v4();
        cache.set(sid, record(Uuid::new_v4()));

        assert!(cache.get(sid).is_none());
        // get() already dropped it; a second sweep finds nothing
        assert_eq!(cache.cleanup_expired(), 0);
    }

    #[test]
    fn list_by_map_filters_other_maps() {
        let cache = PresenceCache::new(Duration::from_secs(60));
        let map_a = Uuid::new_v4();
        let map_b = Uuid::new_v4();

        cache.set(Uuid::new_v4(), record(map_a));
        cache.set(Uuid::new_v4(), record(map_a));
        cache.set(Uuid::new_v4(), record(map_b));

        assert_eq!(cache.list_by_map(map_a).len(), 2);
        assert_eq!(cache.list_by_map(map_b).len(), 1);
    }

    #[test]
    fn update_position_changes_record() {
        let cache = PresenceCache::new(Duration::from_secs(60));
        let sid = Uuid::new_v4();
        cache.set(sid, record(Uuid::new_v4()));

        cache.update_position(sid, LatLng { lat: 12.5, lng: -7.25 });
        let got = cache.get(sid).unwrap();
        assert_eq!(got.position.lat, 12.5);
        assert_eq!(got.position.lng, -7.25);
    }
}
