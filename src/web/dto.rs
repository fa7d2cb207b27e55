//! Serializable DTOs shared across API handlers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use ts_rs::TS;
use uuid::Uuid;

use crate::data::models::{AccountType, LatLng, Map, Poi, Session, User, UserRole};

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserProfileDto {
    pub id: Uuid,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about_me: Option<String>,
    pub account_type: AccountType,
    pub role: UserRole,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserProfileDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name.clone(),
            email: user.email.clone(),
            avatar_url: user.avatar_url.clone(),
            about_me: user.about_me.clone(),
            account_type: user.account_type,
            role: user.role,
            email_verified: user.email_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionDto {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub map_id: Uuid,
    pub avatar_position: LatLng,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl From<&Session> for SessionDto {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id,
            user_id: session.user_id,
            map_id: session.map_id,
            avatar_position: session.position(),
            is_active: session.is_active,
            created_at: session.created_at,
            last_active: session.last_active,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MapDto {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_by: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Map> for MapDto {
    fn from(map: &Map) -> Self {
        Self {
            id: map.id,
            name: map.name.clone(),
            description: map.description.clone(),
            created_by: map.created_by,
            is_active: map.is_active,
            created_at: map.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PoiDto {
    pub id: Uuid,
    pub map_id: Uuid,
    pub name: String,
    pub description: String,
    pub position: LatLng,
    pub max_participants: i32,
    /// Live count from the participation store, not a durable column.
    pub participant_count: usize,
    pub created_by: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub is_discussion_active: bool,
    pub discussion_start_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PoiDto {
    pub fn from_poi(poi: &Poi, participant_count: usize) -> Self {
        Self {
            id: poi.id,
            map_id: poi.map_id,
            name: poi.name.clone(),
            description: poi.description.clone(),
            position: poi.position(),
            max_participants: poi.max_participants,
            participant_count,
            created_by: poi.created_by,
            image_url: poi.image_url.clone(),
            thumbnail_url: poi.thumbnail_url.clone(),
            is_discussion_active: poi.is_discussion_active,
            discussion_start_time: poi.discussion_start_time,
            created_at: poi.created_at,
            updated_at: poi.updated_at,
        }
    }
}
