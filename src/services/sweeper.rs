//! Periodic cleanup: session expiry, presence sweep, counter pruning.

use chrono::Utc;
use std::time::Duration;
use tracing::{info, warn};

use super::Service;
use crate::state::AppState;
use crate::status::ServiceStatus;

/// Background service running the expiry sweep on a fixed cadence.
///
/// Sessions expired here get the same teardown as an explicit end,
/// including POI eviction and its leave events.
pub struct SweeperService {
    app_state: AppState,
    interval: Duration,
}

impl SweeperService {
    pub fn new(app_state: AppState, interval: Duration) -> Self {
        Self {
            app_state,
            interval,
        }
    }

    async fn sweep(state: &AppState) {
        match state.sessions.cleanup_expired().await {
            Ok(expired) => {
                if expired > 0 {
                    info!(expired, "expired idle sessions");
                }
            }
            Err(e) => {
                warn!(error = %e, "session expiry sweep failed");
            }
        }

        let pruned = state.counters.cleanup_expired(Utc::now());
        if pruned > 0 {
            tracing::debug!(pruned, "pruned stale rate-limit counters");
        }
    }
}

#[async_trait::async_trait]
impl Service for SweeperService {
    fn name(&self) -> &'static str {
        "sweeper"
    }

    async fn run(&mut self) -> Result<(), anyhow::Error> {
        self.app_state
            .service_statuses
            .set("sweeper", ServiceStatus::Active);

        let mut interval = tokio::time::interval(self.interval);
        // The immediate first tick would sweep an empty world
        interval.tick().await;

        loop {
            interval.tick().await;
            Self::sweep(&self.app_state).await;
        }
    }

    async fn shutdown(&mut self) -> Result<(), anyhow::Error> {
        // The sweep loop is dropped by the service runner; nothing to flush
        Ok(())
    }
}
