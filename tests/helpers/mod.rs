use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use breakoutglobe::cache::{ParticipationCache, PresenceCache};
use breakoutglobe::data::models::{AccountType, LatLng, Map, User};
use breakoutglobe::data::{self, users::NewUser};
use breakoutglobe::events::EventBus;
use breakoutglobe::poi::PoiService;
use breakoutglobe::session::SessionService;

/// The engine assembly a test world runs on: both engines plus direct
/// handles on the ephemeral stores and the event bus for assertions.
pub struct World {
    pub sessions: Arc<SessionService>,
    pub pois: Arc<PoiService>,
    pub presence: PresenceCache,
    pub participation: ParticipationCache,
    pub events: Arc<EventBus>,
}

/// Build the engines against a test database with a 30-minute session TTL.
pub fn world(pool: &PgPool) -> World {
    let presence = PresenceCache::new(Duration::from_secs(30 * 60));
    let participation = ParticipationCache::new();
    let events = Arc::new(EventBus::new(64));

    let pois = Arc::new(PoiService::new(
        pool.clone(),
        participation.clone(),
        presence.clone(),
        events.clone(),
    ));
    let sessions = Arc::new(SessionService::new(
        pool.clone(),
        presence.clone(),
        events.clone(),
        pois.clone(),
        Duration::from_secs(30 * 60),
    ));

    World {
        sessions,
        pois,
        presence,
        participation,
        events,
    }
}

/// Insert a guest user.
pub async fn make_guest(pool: &PgPool, display_name: &str) -> User {
    data::users::create_user(
        pool,
        NewUser {
            id: Uuid::new_v4(),
            display_name,
            email: None,
            password_hash: None,
            about_me: None,
            account_type: AccountType::Guest,
        },
    )
    .await
    .expect("failed to create test user")
}

/// Insert a map owned by a fresh creator.
pub async fn make_map(pool: &PgPool, name: &str) -> Map {
    let creator = make_guest(pool, "map-creator").await;
    data::maps::create_map(pool, Uuid::new_v4(), name, None, creator.id)
        .await
        .expect("failed to create test map")
}

pub fn pos(lat: f64, lng: f64) -> LatLng {
    LatLng { lat, lng }
}
