//! Application state shared across components (web, sweeper).

use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::JwtKeys;
use crate::cache::{ParticipationCache, PresenceCache, RateCounters};
use crate::config::Config;
use crate::events::EventBus;
use crate::feedback::{FeedbackForwarder, GithubConfig};
use crate::images::{ImageStore, LocalImageStore};
use crate::limiter::RateLimiter;
use crate::poi::PoiService;
use crate::session::SessionService;
use crate::status::ServiceStatusRegistry;

/// Bounded per-subscriber event buffer; lagging past it disconnects the client.
const EVENT_BUFFER_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub presence: PresenceCache,
    pub participation: ParticipationCache,
    pub counters: Arc<RateCounters>,
    pub events: Arc<EventBus>,
    pub limiter: Arc<RateLimiter>,
    pub sessions: Arc<SessionService>,
    pub pois: Arc<PoiService>,
    pub jwt: Arc<JwtKeys>,
    pub images: Arc<dyn ImageStore>,
    pub feedback: Option<Arc<FeedbackForwarder>>,
    pub service_statuses: ServiceStatusRegistry,
    /// Where uploaded images land; served statically under `/uploads`.
    pub upload_dir: std::path::PathBuf,
}

impl AppState {
    pub fn new(config: &Config, db_pool: PgPool) -> Self {
        let presence = PresenceCache::new(config.session_ttl);
        let participation = ParticipationCache::new();
        let counters = Arc::new(RateCounters::new());
        let events = Arc::new(EventBus::new(EVENT_BUFFER_CAPACITY));
        let limiter = Arc::new(RateLimiter::new(counters.clone()));

        let pois = Arc::new(PoiService::new(
            db_pool.clone(),
            participation.clone(),
            presence.clone(),
            events.clone(),
        ));
        let sessions = Arc::new(SessionService::new(
            db_pool.clone(),
            presence.clone(),
            events.clone(),
            pois.clone(),
            config.session_ttl,
        ));

        let feedback = GithubConfig::from_env()
            .map(|github| Arc::new(FeedbackForwarder::new(github)));

        Self {
            db_pool,
            presence,
            participation,
            counters,
            events,
            limiter,
            sessions,
            pois,
            jwt: Arc::new(JwtKeys::new(&config.jwt_secret, config.jwt_ttl)),
            images: Arc::new(LocalImageStore::new(&config.upload_dir, "/uploads")),
            feedback,
            service_statuses: ServiceStatusRegistry::new(),
            upload_dir: config.upload_dir.clone().into(),
        }
    }
}
