//! POI engine: CRUD, participation, and the discussion-timer state machine.

use chrono::Utc;
use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{JoinOutcome, ParticipationCache, PresenceCache};
use crate::data::models::{Bounds, LatLng, Poi, UserRole};
use crate::data::{self, pois::NewPoi};
use crate::errors::{Result, ServiceError};
use crate::events::{DomainEvent, EventBus, ParticipantInfo, PoiPayload};

const NAME_MAX_CHARS: usize = 100;
const DESCRIPTION_MAX_CHARS: usize = 500;
const MAX_PARTICIPANTS_CEILING: i32 = 50;
const DEFAULT_MAX_PARTICIPANTS: i32 = 10;

/// Fields for POI creation. Image URLs come from the image collaborator,
/// which runs before any durable write.
pub struct CreatePoiInput {
    pub map_id: Uuid,
    pub name: String,
    pub description: String,
    pub position: LatLng,
    pub max_participants: Option<i32>,
    pub created_by: Uuid,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// Partial update of a POI. `None` fields are left untouched.
#[derive(Default)]
pub struct PoiUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub max_participants: Option<i32>,
}

/// Result of a join or leave: the POI after any timer transition plus the
/// resolved participant list.
#[derive(Debug)]
pub struct ParticipationChange {
    pub poi: Poi,
    pub participants: Vec<ParticipantInfo>,
}

/// The POI participation engine.
///
/// Membership truth lives in the ephemeral participation store; the
/// discussion timer is an emergent consequence of the member count and only
/// its transitions are persisted. A per-user advisory lock serializes the
/// join path so the single-POI invariant holds under concurrent joins by
/// the same user.
pub struct PoiService {
    pool: PgPool,
    participation: ParticipationCache,
    presence: PresenceCache,
    events: Arc<EventBus>,
    user_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl PoiService {
    pub fn new(
        pool: PgPool,
        participation: ParticipationCache,
        presence: PresenceCache,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            pool,
            participation,
            presence,
            events,
            user_locks: DashMap::new(),
        }
    }

    /// Create a POI after validating fields and the duplicate-location rule.
    pub async fn create_poi(&self, input: CreatePoiInput) -> Result<Poi> {
        validate_name(&input.name)?;
        validate_description(&input.description)?;
        let max_participants = input.max_participants.unwrap_or(DEFAULT_MAX_PARTICIPANTS);
        validate_capacity(max_participants)?;
        if !input.position.in_range() {
            return Err(ServiceError::validation("position out of range"));
        }

        data::maps::get_map(&self.pool, input.map_id)
            .await?
            .ok_or(ServiceError::MapNotFound)?;
        data::users::get_user(&self.pool, input.created_by)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        if data::pois::check_duplicate_location(&self.pool, input.map_id, input.position, None)
            .await?
        {
            return Err(ServiceError::DuplicateLocation);
        }

        let poi = data::pois::create_poi(
            &self.pool,
            NewPoi {
                id: Uuid::new_v4(),
                map_id: input.map_id,
                name: &input.name,
                description: &input.description,
                position: input.position,
                max_participants,
                created_by: input.created_by,
                image_url: input.image_url.as_deref(),
                thumbnail_url: input.thumbnail_url.as_deref(),
            },
        )
        .await?;

        debug!(poi_id = %poi.id, map_id = %poi.map_id, "poi created");
        self.events.publish(DomainEvent::PoiCreated {
            poi: PoiPayload::from(&poi),
        });
        Ok(poi)
    }

    /// Fetch a POI, or `PoiNotFound`.
    pub async fn get_poi(&self, poi_id: Uuid) -> Result<Poi> {
        data::pois::get_poi(&self.pool, poi_id)
            .await?
            .ok_or(ServiceError::PoiNotFound)
    }

    /// List all POIs on a map.
    pub async fn list_by_map(&self, map_id: Uuid) -> Result<Vec<Poi>> {
        data::maps::get_map(&self.pool, map_id)
            .await?
            .ok_or(ServiceError::MapNotFound)?;
        Ok(data::pois::get_pois_by_map(&self.pool, map_id).await?)
    }

    /// List POIs inside a bounding box. Invalid bounds are rejected before
    /// any store call.
    pub async fn list_in_bounds(&self, map_id: Uuid, bounds: Bounds) -> Result<Vec<Poi>> {
        if !bounds.is_valid() {
            return Err(ServiceError::validation(
                "bounds require min < max and in-range corners",
            ));
        }
        data::maps::get_map(&self.pool, map_id)
            .await?
            .ok_or(ServiceError::MapNotFound)?;
        Ok(data::pois::get_pois_in_bounds(&self.pool, map_id, bounds).await?)
    }

    /// Partial update of name, description and capacity. Creator or admin only.
    pub async fn update_poi(
        &self,
        poi_id: Uuid,
        update: PoiUpdate,
        caller_id: Uuid,
        caller_role: UserRole,
    ) -> Result<Poi> {
        let existing = self.get_poi(poi_id).await?;
        if existing.created_by != caller_id && !caller_role.is_admin() {
            return Err(ServiceError::Forbidden);
        }

        if let Some(name) = update.name.as_deref() {
            validate_name(name)?;
        }
        if let Some(description) = update.description.as_deref() {
            validate_description(description)?;
        }
        if let Some(max) = update.max_participants {
            validate_capacity(max)?;
        }

        let poi = data::pois::update_poi(
            &self.pool,
            poi_id,
            update.name.as_deref(),
            update.description.as_deref(),
            update.max_participants,
        )
        .await?
        .ok_or(ServiceError::PoiNotFound)?;

        self.events.publish(DomainEvent::PoiUpdated {
            poi: PoiPayload::from(&poi),
        });
        Ok(poi)
    }

    /// Delete a POI. Creator or admin only. Participation is emptied before
    /// the durable delete so no one is ever observed inside a missing POI.
    pub async fn delete_poi(
        &self,
        poi_id: Uuid,
        caller_id: Uuid,
        caller_role: UserRole,
    ) -> Result<()> {
        let poi = self.get_poi(poi_id).await?;
        if poi.created_by != caller_id && !caller_role.is_admin() {
            return Err(ServiceError::Forbidden);
        }

        let removed = self.participation.remove_all(poi_id);
        self.presence.clear_poi(poi_id);
        data::pois::delete_poi(&self.pool, poi_id).await?;

        debug!(poi_id = %poi_id, evicted = removed.len(), "poi deleted");
        self.events.publish(DomainEvent::PoiDeleted {
            poi_id,
            map_id: poi.map_id,
        });
        Ok(())
    }

    /// Join a POI.
    ///
    /// If the user is in another POI they are moved: the old POI gets a
    /// leave (with its own timer update and event). The seat on the target
    /// is claimed by the atomic join before any prior membership is
    /// touched, so a rejected join leaves existing membership untouched.
    /// Joining the POI they are already in is `AlreadyJoined`.
    pub async fn join_poi(
        &self,
        poi_id: Uuid,
        user_id: Uuid,
        session_id: Option<Uuid>,
    ) -> Result<ParticipationChange> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let poi = self.get_poi(poi_id).await?;
        data::users::get_user(&self.pool, user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        if self.participation.is_member(poi_id, user_id) {
            return Err(ServiceError::AlreadyJoined);
        }

        let priors = self.participation.pois_for(user_id);

        match self
            .participation
            .join(poi_id, user_id, poi.max_participants.max(0) as usize)
        {
            JoinOutcome::Joined => {}
            JoinOutcome::Full => return Err(ServiceError::CapacityExceeded),
            JoinOutcome::AlreadyMember => return Err(ServiceError::AlreadyJoined),
        }

        // Single-POI invariant: with the seat secured, leave anything else.
        // The user lock keeps the brief overlap invisible to their own ops
        for prior in priors {
            if prior != poi_id {
                self.leave_and_publish(prior, user_id, session_id).await?;
            }
        }

        let poi = self.sync_discussion_timer(poi_id).await?.unwrap_or(poi);

        let session_id = self.resolve_session(user_id, poi.map_id, session_id).await;
        if let Some(sid) = session_id {
            self.presence.set_current_poi(sid, Some(poi_id));
        }

        let participants = self.participants(poi_id).await?;
        self.events.publish(DomainEvent::PoiJoined {
            poi_id,
            map_id: poi.map_id,
            user_id,
            session_id,
            current_count: participants.len(),
            participants: participants.clone(),
            timestamp: Utc::now(),
        });

        Ok(ParticipationChange { poi, participants })
    }

    /// Leave a POI. Not being a member is a distinct condition.
    pub async fn leave_poi(
        &self,
        poi_id: Uuid,
        user_id: Uuid,
        session_id: Option<Uuid>,
    ) -> Result<ParticipationChange> {
        self.get_poi(poi_id).await?;

        if !self.leave_and_publish(poi_id, user_id, session_id).await? {
            return Err(ServiceError::NotJoined);
        }

        let poi = self.get_poi(poi_id).await?;
        let participants = self.participants(poi_id).await?;
        Ok(ParticipationChange { poi, participants })
    }

    /// Remove a user from whatever POI they are in, publishing the
    /// corresponding leave events. Used on session end and expiry; a user
    /// in no POI is a no-op.
    pub async fn evict_user(&self, user_id: Uuid) -> Result<()> {
        for poi_id in self.participation.pois_for(user_id) {
            self.leave_and_publish(poi_id, user_id, None).await?;
        }
        Ok(())
    }

    /// Resolve the current member list to participant display info.
    pub async fn participants(&self, poi_id: Uuid) -> Result<Vec<ParticipantInfo>> {
        let member_ids = self.participation.members(poi_id);
        if member_ids.is_empty() {
            return Ok(Vec::new());
        }
        let users = data::users::get_users_by_ids(&self.pool, &member_ids).await?;
        Ok(users
            .into_iter()
            .map(|user| ParticipantInfo {
                id: user.id,
                display_name: user.display_name,
                avatar_url: user.avatar_url,
            })
            .collect())
    }

    /// Current member count of a POI.
    pub fn participant_count(&self, poi_id: Uuid) -> usize {
        self.participation.count(poi_id)
    }

    fn user_lock(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.user_locks.entry(user_id).or_default().clone()
    }

    /// Perform the leave plus its timer update and event. Returns whether
    /// the user was actually a member.
    async fn leave_and_publish(
        &self,
        poi_id: Uuid,
        user_id: Uuid,
        session_id: Option<Uuid>,
    ) -> Result<bool> {
        if !self.participation.leave(poi_id, user_id) {
            return Ok(false);
        }

        let Some(poi) = data::pois::get_poi(&self.pool, poi_id).await? else {
            // Deleted concurrently; membership is already gone
            return Ok(true);
        };
        let poi = self.sync_discussion_timer(poi_id).await?.unwrap_or(poi);

        let session_id = self.resolve_session(user_id, poi.map_id, session_id).await;
        if let Some(sid) = session_id {
            self.presence.set_current_poi(sid, None);
        }

        let participants = self.participants(poi_id).await?;
        self.events.publish(DomainEvent::PoiLeft {
            poi_id,
            map_id: poi.map_id,
            user_id,
            session_id,
            current_count: participants.len(),
            participants,
            timestamp: Utc::now(),
        });
        Ok(true)
    }

    /// Apply the discussion-timer state machine for a POI.
    ///
    /// INACTIVE with two or more participants becomes ACTIVE stamped now;
    /// ACTIVE with fewer than two reverts and the start time is cleared.
    /// Anything else writes nothing. Returns the refreshed row when a
    /// transition was persisted.
    async fn sync_discussion_timer(&self, poi_id: Uuid) -> Result<Option<Poi>> {
        let Some(poi) = data::pois::get_poi(&self.pool, poi_id).await? else {
            return Ok(None);
        };
        let count = self.participation.count(poi_id);

        match (poi.is_discussion_active, count >= 2) {
            (false, true) => {
                data::pois::set_discussion_state(&self.pool, poi_id, Some(Utc::now())).await?;
                debug!(poi_id = %poi_id, count, "discussion started");
            }
            (true, false) => {
                data::pois::set_discussion_state(&self.pool, poi_id, None).await?;
                debug!(poi_id = %poi_id, count, "discussion ended");
            }
            _ => return Ok(Some(poi)),
        }

        Ok(data::pois::get_poi(&self.pool, poi_id).await?)
    }

    /// Best-effort resolution of the session carrying a participation
    /// change, for presence bookkeeping and event payloads.
    async fn resolve_session(
        &self,
        user_id: Uuid,
        map_id: Uuid,
        session_id: Option<Uuid>,
    ) -> Option<Uuid> {
        if session_id.is_some() {
            return session_id;
        }
        match data::sessions::get_active_by_user_and_map(&self.pool, user_id, map_id).await {
            Ok(session) => session.map(|s| s.id),
            Err(e) => {
                warn!(error = %e, user_id = %user_id, "failed to resolve session for participation event");
                None
            }
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ServiceError::validation("name must not be empty"));
    }
    if name.chars().count() > NAME_MAX_CHARS {
        return Err(ServiceError::validation(format!(
            "name must be at most {NAME_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<()> {
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(ServiceError::validation(format!(
            "description must be at most {DESCRIPTION_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_capacity(max_participants: i32) -> Result<()> {
    if !(1..=MAX_PARTICIPANTS_CEILING).contains(&max_participants) {
        return Err(ServiceError::validation(format!(
            "maxParticipants must be between 1 and {MAX_PARTICIPANTS_CEILING}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_bounds() {
        assert!(validate_name("Cafe").is_ok());
        assert!(validate_name(&"x".repeat(100)).is_ok());
        assert!(validate_name(&"x".repeat(101)).is_err());
        assert!(validate_name("   ").is_err());
    }

    #[test]
    fn description_bounds() {
        assert!(validate_description("").is_ok());
        assert!(validate_description(&"d".repeat(500)).is_ok());
        assert!(validate_description(&"d".repeat(501)).is_err());
    }

    #[test]
    fn capacity_bounds() {
        assert!(validate_capacity(0).is_err());
        assert!(validate_capacity(1).is_ok());
        assert!(validate_capacity(50).is_ok());
        assert!(validate_capacity(51).is_err());
    }
}
