//! Sliding-window request counters keyed by (user, action).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug)]
struct Window {
    stamps: Vec<DateTime<Utc>>,
    expires_at: DateTime<Utc>,
}

/// The state of one counter window after a recorded request.
#[derive(Debug, Clone, Copy)]
pub struct WindowSnapshot {
    /// Requests inside the window, including the one just recorded.
    pub count: usize,
    /// Oldest timestamp still inside the window.
    pub oldest: DateTime<Utc>,
}

/// Per-(user, action) multisets of request timestamps.
///
/// [`record`](Self::record) performs the whole prune / add / count /
/// extend-expiry sequence under the entry lock, so concurrent gateway
/// workers observe a consistent count.
#[derive(Clone, Default)]
pub struct RateCounters {
    windows: Arc<DashMap<(Uuid, &'static str), Window>>,
}

impl RateCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request at `now` and return the resulting window state.
    /// Entries older than `now - window` are pruned; the key's expiry is
    /// extended to `2 * window`.
    pub fn record(
        &self,
        user_id: Uuid,
        action: &'static str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> WindowSnapshot {
        let window_chrono = ChronoDuration::from_std(window).unwrap_or(ChronoDuration::zero());
        let floor = now - window_chrono;

        let mut entry = self.windows.entry((user_id, action)).or_insert(Window {
            stamps: Vec::new(),
            expires_at: now,
        });
        entry.stamps.retain(|t| *t > floor);
        entry.stamps.push(now);
        entry.expires_at = now + window_chrono * 2;

        WindowSnapshot {
            count: entry.stamps.len(),
            oldest: entry.stamps.first().copied().unwrap_or(now),
        }
    }

    /// Drop all counters for one user (logout / admin reset).
    pub fn clear_user(&self, user_id: Uuid) {
        self.windows.retain(|(uid, _), _| *uid != user_id);
    }

    /// Drop keys whose expiry has passed. Returns the number removed.
    pub fn cleanup_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| window.expires_at > now);
        before - self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_counts_within_window() {
        let counters = RateCounters::new();
        let user = Uuid::new_v4();
        let now = Utc::now();
        let window = Duration::from_secs(60);

        for expected in 1..=5 {
            let snap = counters.record(user, "create-poi", now, window);
            assert_eq!(snap.count, expected);
        }
    }

    #[test]
    fn old_stamps_are_pruned() {
        let counters = RateCounters::new();
        let user = Uuid::new_v4();
        let window = Duration::from_secs(60);
        let start = Utc::now();

        counters.record(user, "join-poi", start, window);
        counters.record(user, "join-poi", start, window);

        // 61 seconds later both stamps have left the window
        let later = start + ChronoDuration::seconds(61);
        let snap = counters.record(user, "join-poi", later, window);
        assert_eq!(snap.count, 1);
        assert_eq!(snap.oldest, later);
    }

    #[test]
    fn actions_are_tracked_independently() {
        let counters = RateCounters::new();
        let user = Uuid::new_v4();
        let now = Utc::now();
        let window = Duration::from_secs(60);

        counters.record(user, "join-poi", now, window);
        counters.record(user, "join-poi", now, window);
        let snap = counters.record(user, "leave-poi", now, window);
        assert_eq!(snap.count, 1);
    }

    #[test]
    fn clear_user_drops_all_actions() {
        let counters = RateCounters::new();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let now = Utc::now();
        let window = Duration::from_secs(60);

        counters.record(user, "join-poi", now, window);
        counters.record(user, "create-poi", now, window);
        counters.record(other, "join-poi", now, window);

        counters.clear_user(user);

        assert_eq!(counters.record(user, "join-poi", now, window).count, 1);
        assert_eq!(counters.record(other, "join-poi", now, window).count, 2);
    }

    #[test]
    fn cleanup_drops_expired_keys() {
        let counters = RateCounters::new();
        let user = Uuid::new_v4();
        let window = Duration::from_secs(30);
        let start = Utc::now();

        counters.record(user, "update-avatar", start, window);

        // Expiry is 2x the window; just before it nothing is dropped
        assert_eq!(counters.cleanup_expired(start + ChronoDuration::seconds(59)), 0);
        assert_eq!(counters.cleanup_expired(start + ChronoDuration::seconds(61)), 1);
    }
}
