//! Per-user sliding-window rate limiting over the ephemeral counter store.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use uuid::Uuid;

use crate::cache::RateCounters;

/// Mutating operations subject to rate limiting, each with its own window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateSession,
    UpdateAvatar,
    CreatePoi,
    JoinPoi,
    LeavePoi,
    UpdatePoi,
    DeletePoi,
    UpdateProfile,
}

impl Action {
    /// Stable key used for counter storage.
    pub fn key(&self) -> &'static str {
        match self {
            Action::CreateSession => "create-session",
            Action::UpdateAvatar => "update-avatar",
            Action::CreatePoi => "create-poi",
            Action::JoinPoi => "join-poi",
            Action::LeavePoi => "leave-poi",
            Action::UpdatePoi => "update-poi",
            Action::DeletePoi => "delete-poi",
            Action::UpdateProfile => "update-profile",
        }
    }

    /// Default policy for this action.
    pub fn default_limit(&self) -> RateLimit {
        let per_minute = |requests| RateLimit {
            requests,
            window: Duration::from_secs(60),
        };
        match self {
            Action::CreateSession => per_minute(10),
            Action::UpdateAvatar => per_minute(60),
            Action::CreatePoi => per_minute(5),
            Action::JoinPoi => per_minute(20),
            Action::LeavePoi => per_minute(20),
            Action::UpdatePoi => per_minute(10),
            Action::DeletePoi => per_minute(5),
            Action::UpdateProfile => per_minute(60),
        }
    }
}

/// A request budget over a sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: u32,
    pub window: Duration,
}

/// Observability values synthesized on every check, allowed or not.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset: DateTime<Utc>,
    pub window: Duration,
}

/// The rate-limit-exceeded condition, carrying the remaining window time.
#[derive(Debug, Clone, thiserror::Error)]
#[error("rate limit exceeded, retry after {retry_after:?}")]
pub struct RateLimitExceeded {
    pub retry_after: Duration,
    pub status: RateLimitStatus,
}

/// Sliding-window limiter for all mutating operations.
///
/// Defaults come from [`Action::default_limit`]; a per-user override table
/// can replace them. The counter store performs the
/// prune-add-count-extend-expiry sequence as one atomic step, so the check
/// itself is a single read-modify-write against shared state.
pub struct RateLimiter {
    counters: Arc<RateCounters>,
    overrides: RwLock<HashMap<(Uuid, Action), RateLimit>>,
}

impl RateLimiter {
    pub fn new(counters: Arc<RateCounters>) -> Self {
        Self {
            counters,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    /// The limit in force for a (user, action) pair.
    pub fn limit_for(&self, user_id: Uuid, action: Action) -> RateLimit {
        self.overrides
            .read()
            .expect("lock poisoned")
            .get(&(user_id, action))
            .copied()
            .unwrap_or_else(|| action.default_limit())
    }

    /// Replace the default policy for one (user, action) pair.
    pub fn set_override(&self, user_id: Uuid, action: Action, limit: RateLimit) {
        self.overrides
            .write()
            .expect("lock poisoned")
            .insert((user_id, action), limit);
    }

    /// Record a request and decide whether it is allowed.
    pub fn check(&self, user_id: Uuid, action: Action) -> Result<RateLimitStatus, RateLimitExceeded> {
        self.check_at(user_id, action, Utc::now())
    }

    /// [`check`](Self::check) with an explicit clock, for tests.
    pub fn check_at(
        &self,
        user_id: Uuid,
        action: Action,
        now: DateTime<Utc>,
    ) -> Result<RateLimitStatus, RateLimitExceeded> {
        let limit = self.limit_for(user_id, action);
        let snapshot = self.counters.record(user_id, action.key(), now, limit.window);

        let window_chrono =
            ChronoDuration::from_std(limit.window).unwrap_or(ChronoDuration::zero());
        let status = RateLimitStatus {
            limit: limit.requests,
            remaining: (limit.requests as i64 - snapshot.count as i64).max(0) as u32,
            reset: now + window_chrono,
            window: limit.window,
        };

        if snapshot.count <= limit.requests as usize {
            Ok(status)
        } else {
            // The oldest stamp leaving the window frees a slot
            let retry_after = (snapshot.oldest + window_chrono - now)
                .to_std()
                .unwrap_or(Duration::ZERO);
            Err(RateLimitExceeded {
                retry_after,
                status,
            })
        }
    }

    /// Drop all counters and overrides for a user (logout / admin reset).
    pub fn clear_user(&self, user_id: Uuid) {
        self.counters.clear_user(user_id);
        self.overrides
            .write()
            .expect("lock poisoned")
            .retain(|(uid, _), _| *uid != user_id);
    }
}

/// A shared rate limiter instance.
pub type SharedRateLimiter = Arc<RateLimiter>;
