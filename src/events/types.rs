//! Domain event types, serialized as `{type, payload}` WebSocket frames.

use chrono::{DateTime, Utc};
use serde::Serialize;
use ts_rs::TS;
use uuid::Uuid;

use crate::data::models::{LatLng, Poi};

/// A POI participant resolved for client display.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ParticipantInfo {
    pub id: Uuid,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// A serializable projection of a [`Poi`] row for event payloads.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PoiPayload {
    pub id: Uuid,
    pub map_id: Uuid,
    pub name: String,
    pub description: String,
    pub position: LatLng,
    pub max_participants: i32,
    pub created_by: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub is_discussion_active: bool,
    pub discussion_start_time: Option<DateTime<Utc>>,
}

impl From<&Poi> for PoiPayload {
    fn from(poi: &Poi) -> Self {
        Self {
            id: poi.id,
            map_id: poi.map_id,
            name: poi.name.clone(),
            description: poi.description.clone(),
            position: poi.position(),
            max_participants: poi.max_participants,
            created_by: poi.created_by,
            image_url: poi.image_url.clone(),
            thumbnail_url: poi.thumbnail_url.clone(),
            is_discussion_active: poi.is_discussion_active,
            discussion_start_time: poi.discussion_start_time,
        }
    }
}

/// Events pushed to clients attached to a map.
///
/// Durable state is the truth; delivery is best-effort. Clients can always
/// reconstruct the world from the HTTP listings on reconnect.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
#[serde(rename_all_fields = "camelCase")]
#[ts(export)]
pub enum DomainEvent {
    AvatarMoved {
        session_id: Uuid,
        user_id: Uuid,
        map_id: Uuid,
        position: LatLng,
        timestamp: DateTime<Utc>,
    },
    PoiCreated {
        poi: PoiPayload,
    },
    PoiUpdated {
        poi: PoiPayload,
    },
    PoiDeleted {
        poi_id: Uuid,
        map_id: Uuid,
    },
    PoiJoined {
        poi_id: Uuid,
        map_id: Uuid,
        user_id: Uuid,
        session_id: Option<Uuid>,
        current_count: usize,
        participants: Vec<ParticipantInfo>,
        timestamp: DateTime<Utc>,
    },
    PoiLeft {
        poi_id: Uuid,
        map_id: Uuid,
        user_id: Uuid,
        session_id: Option<Uuid>,
        current_count: usize,
        participants: Vec<ParticipantInfo>,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// The map topic this event belongs to.
    pub fn map_id(&self) -> Uuid {
        match self {
            DomainEvent::AvatarMoved { map_id, .. }
            | DomainEvent::PoiDeleted { map_id, .. }
            | DomainEvent::PoiJoined { map_id, .. }
            | DomainEvent::PoiLeft { map_id, .. } => *map_id,
            DomainEvent::PoiCreated { poi } | DomainEvent::PoiUpdated { poi } => poi.map_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_as_type_payload_frames() {
        let event = DomainEvent::AvatarMoved {
            session_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            map_id: Uuid::new_v4(),
            position: LatLng { lat: 41.0, lng: -75.0 },
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "avatar-moved");
        assert_eq!(value["payload"]["position"]["lat"], 41.0);
        assert!(value["payload"]["sessionId"].is_string());
    }

    #[test]
    fn poi_left_uses_kebab_case_tag() {
        let event = DomainEvent::PoiLeft {
            poi_id: Uuid::new_v4(),
            map_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            session_id: None,
            current_count: 1,
            participants: vec![],
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "poi-left");
        assert_eq!(value["payload"]["currentCount"], 1);
    }
}
