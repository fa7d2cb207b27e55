//! Session engine: lifecycle, presence, and movement events.

use chrono::{Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{PresenceCache, PresenceRecord};
use crate::data::models::{LatLng, Session};
use crate::data::{self, is_unique_violation};
use crate::errors::{Result, ServiceError};
use crate::events::{DomainEvent, EventBus};
use crate::poi::PoiService;

/// The session lifecycle engine.
///
/// The durable row is authoritative on session identity; the presence
/// record is authoritative on current activity. Ending a session (explicit
/// or by expiry) also evicts the user from any POI via the POI engine, so
/// both paths observe identical teardown.
pub struct SessionService {
    pool: PgPool,
    presence: PresenceCache,
    events: Arc<EventBus>,
    pois: Arc<PoiService>,
    session_ttl: Duration,
}

impl SessionService {
    pub fn new(
        pool: PgPool,
        presence: PresenceCache,
        events: Arc<EventBus>,
        pois: Arc<PoiService>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            pool,
            presence,
            events,
            pois,
            session_ttl,
        }
    }

    /// Create a session for a user on a map.
    ///
    /// No event is published; clients seed their world view from the
    /// active-sessions listing on attach.
    pub async fn create_session(
        &self,
        user_id: Uuid,
        map_id: Uuid,
        position: LatLng,
    ) -> Result<Session> {
        if !position.in_range() {
            return Err(ServiceError::validation("position out of range"));
        }

        data::maps::get_map(&self.pool, map_id)
            .await?
            .ok_or(ServiceError::MapNotFound)?;
        data::users::get_user(&self.pool, user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        if data::sessions::get_active_by_user_and_map(&self.pool, user_id, map_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::UserAlreadyInMap);
        }

        let session =
            data::sessions::create_session(&self.pool, Uuid::new_v4(), user_id, map_id, position)
                .await
                .map_err(|e| {
                    // Two concurrent creates race past the pre-check; the
                    // partial unique index is the authoritative test
                    if is_unique_violation(&e, "sessions_one_active_per_user_map") {
                        ServiceError::UserAlreadyInMap
                    } else {
                        ServiceError::Database(e)
                    }
                })?;

        self.presence.set(
            session.id,
            PresenceRecord {
                user_id,
                map_id,
                position,
                last_active: session.last_active,
                current_poi: None,
            },
        );

        info!(session_id = %session.id, user_id = %user_id, map_id = %map_id, "session created");
        Ok(session)
    }

    /// Fetch a session by id, or `SessionNotFound`.
    pub async fn get_session(&self, session_id: Uuid) -> Result<Session> {
        data::sessions::get_session(&self.pool, session_id)
            .await?
            .ok_or(ServiceError::SessionNotFound)
    }

    /// Persist a new avatar position and broadcast `avatar-moved`.
    ///
    /// The durable write is the truth; the event is best-effort and a
    /// publish with no subscribers simply evaporates.
    pub async fn update_position(&self, session_id: Uuid, position: LatLng) -> Result<Session> {
        if !position.in_range() {
            return Err(ServiceError::validation("position out of range"));
        }

        let session = data::sessions::update_position(&self.pool, session_id, position)
            .await?
            .ok_or(ServiceError::SessionNotFound)?;

        // Movement also heals a presence record lost to an ephemeral-store
        // restart; the durable row just proved the session is live
        if self.presence.get(session_id).is_some() {
            self.presence.update_position(session_id, position);
        } else {
            self.presence.set(
                session_id,
                PresenceRecord {
                    user_id: session.user_id,
                    map_id: session.map_id,
                    position,
                    last_active: session.last_active,
                    current_poi: None,
                },
            );
        }
        self.events.publish(DomainEvent::AvatarMoved {
            session_id,
            user_id: session.user_id,
            map_id: session.map_id,
            position,
            timestamp: Utc::now(),
        });
        Ok(session)
    }

    /// Refresh `last_active` durably and the presence TTL. No event.
    pub async fn heartbeat(&self, session_id: Uuid) -> Result<()> {
        if !data::sessions::heartbeat(&self.pool, session_id).await? {
            return Err(ServiceError::SessionNotFound);
        }
        self.presence.heartbeat(session_id);
        Ok(())
    }

    /// End a session: durable deactivation, presence removal, and POI
    /// eviction with its leave events.
    pub async fn end_session(&self, session_id: Uuid) -> Result<Session> {
        let session = data::sessions::end_session(&self.pool, session_id)
            .await?
            .ok_or(ServiceError::SessionNotFound)?;

        self.presence.remove(session_id);
        self.pois.evict_user(session.user_id).await?;

        info!(session_id = %session_id, user_id = %session.user_id, "session ended");
        Ok(session)
    }

    /// Active sessions on a map, for client attach.
    pub async fn list_active_by_map(&self, map_id: Uuid) -> Result<Vec<Session>> {
        data::maps::get_map(&self.pool, map_id)
            .await?
            .ok_or(ServiceError::MapNotFound)?;
        Ok(data::sessions::list_active_by_map(&self.pool, map_id).await?)
    }

    /// Expire sessions whose last heartbeat predates the TTL. Each expired
    /// session is torn down identically to an explicit end. Returns the
    /// number expired.
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let ttl = ChronoDuration::from_std(self.session_ttl).unwrap_or(ChronoDuration::zero());
        let cutoff = Utc::now() - ttl;

        let expired = data::sessions::expire_before(&self.pool, cutoff).await?;
        for session in &expired {
            self.presence.remove(session.id);
            self.pois.evict_user(session.user_id).await?;
        }

        let swept = self.presence.cleanup_expired();
        if !expired.is_empty() || swept > 0 {
            debug!(expired = expired.len(), presence_swept = swept, "session cleanup pass");
        }
        Ok(expired.len())
    }
}
