//! Row types for the database schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use uuid::Uuid;

/// How an account was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, TS)]
#[sqlx(type_name = "account_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum AccountType {
    Guest,
    Full,
}

/// Authorization role. Defaults to `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, TS)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum UserRole {
    User,
    Admin,
    Superadmin,
}

impl UserRole {
    /// Whether this role grants administrative access.
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Superadmin)
    }
}

/// A geographic position. Latitude in [-90, 90], longitude in [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Check the WGS84 range bounds. The poles and the antimeridian are inclusive.
    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// An inclusive latitude/longitude box for POI queries.
#[derive(Debug, Clone, Copy, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Bounds are valid when each minimum is strictly below its maximum
    /// and all four corners are in range.
    pub fn is_valid(&self) -> bool {
        self.min_lat < self.max_lat
            && self.min_lng < self.max_lng
            && LatLng { lat: self.min_lat, lng: self.min_lng }.in_range()
            && LatLng { lat: self.max_lat, lng: self.max_lng }.in_range()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub avatar_url: Option<String>,
    pub about_me: Option<String>,
    pub account_type: AccountType,
    pub role: UserRole,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_active_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Map {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's presence on a map with a current avatar position.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub map_id: Uuid,
    pub avatar_lat: f64,
    pub avatar_lng: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn position(&self) -> LatLng {
        LatLng {
            lat: self.avatar_lat,
            lng: self.avatar_lng,
        }
    }
}

/// A point of interest users gather around.
#[derive(Debug, Clone, FromRow)]
pub struct Poi {
    pub id: Uuid,
    pub map_id: Uuid,
    pub name: String,
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    pub max_participants: i32,
    pub created_by: Uuid,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_discussion_active: bool,
    pub discussion_start_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Poi {
    pub fn position(&self) -> LatLng {
        LatLng {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latlng_poles_and_antimeridian_are_inclusive() {
        assert!(LatLng { lat: 90.0, lng: 180.0 }.in_range());
        assert!(LatLng { lat: -90.0, lng: -180.0 }.in_range());
        assert!(!LatLng { lat: 90.0001, lng: 0.0 }.in_range());
        assert!(!LatLng { lat: 0.0, lng: -180.0001 }.in_range());
    }

    #[test]
    fn bounds_require_strict_ordering() {
        let degenerate = Bounds {
            min_lat: 10.0,
            max_lat: 10.0,
            min_lng: -5.0,
            max_lng: 5.0,
        };
        assert!(!degenerate.is_valid());

        let ok = Bounds {
            min_lat: 9.0,
            max_lat: 10.0,
            min_lng: -5.0,
            max_lng: 5.0,
        };
        assert!(ok.is_valid());
    }

    #[test]
    fn role_admin_check() {
        assert!(!UserRole::User.is_admin());
        assert!(UserRole::Admin.is_admin());
        assert!(UserRole::Superadmin.is_admin());
    }
}
