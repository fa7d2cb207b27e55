//! Database query functions for map sessions.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{LatLng, Session};

/// Insert a new active session. A second active session for the same
/// (user, map) surfaces as a unique violation on
/// `sessions_one_active_per_user_map`.
pub async fn create_session(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    map_id: Uuid,
    position: LatLng,
) -> Result<Session> {
    sqlx::query_as::<_, Session>(
        r#"
        INSERT INTO sessions (id, user_id, map_id, avatar_lat, avatar_lng)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(map_id)
    .bind(position.lat)
    .bind(position.lng)
    .fetch_one(pool)
    .await
    .context("failed to create session")
}

/// Fetch a session by id, active or not.
pub async fn get_session(pool: &PgPool, id: Uuid) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to get session")
}

/// Fetch the active session for a (user, map) pair, if any.
pub async fn get_active_by_user_and_map(
    pool: &PgPool,
    user_id: Uuid,
    map_id: Uuid,
) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>(
        "SELECT * FROM sessions WHERE user_id = $1 AND map_id = $2 AND is_active",
    )
    .bind(user_id)
    .bind(map_id)
    .fetch_optional(pool)
    .await
    .context("failed to get session by user and map")
}

/// List all active sessions on a map, oldest first. Clients fetch this on
/// attach to seed their world view.
pub async fn list_active_by_map(pool: &PgPool, map_id: Uuid) -> Result<Vec<Session>> {
    sqlx::query_as::<_, Session>(
        "SELECT * FROM sessions WHERE map_id = $1 AND is_active ORDER BY created_at",
    )
    .bind(map_id)
    .fetch_all(pool)
    .await
    .context("failed to list sessions by map")
}

/// Persist a new avatar position and bump `last_active`. Returns the updated
/// row, or `None` if the session does not exist or is inactive.
pub async fn update_position(pool: &PgPool, id: Uuid, position: LatLng) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>(
        r#"
        UPDATE sessions
        SET avatar_lat = $2, avatar_lng = $3, last_active = now()
        WHERE id = $1 AND is_active
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(position.lat)
    .bind(position.lng)
    .fetch_optional(pool)
    .await
    .context("failed to update session position")
}

/// Bump `last_active` for an active session. Returns whether a row matched.
pub async fn heartbeat(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("UPDATE sessions SET last_active = now() WHERE id = $1 AND is_active")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to heartbeat session")?;
    Ok(result.rows_affected() > 0)
}

/// Mark a session inactive. Returns the final row if it was active.
pub async fn end_session(pool: &PgPool, id: Uuid) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>(
        r#"
        UPDATE sessions
        SET is_active = FALSE, expires_at = now()
        WHERE id = $1 AND is_active
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to end session")
}

/// A session marked inactive by the expiry sweep.
#[derive(Debug, sqlx::FromRow)]
pub struct ExpiredSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub map_id: Uuid,
}

/// Mark every active session with `last_active` before the cutoff as
/// inactive, returning the affected rows so the caller can tear down their
/// ephemeral state the same way an explicit end would.
pub async fn expire_before(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<Vec<ExpiredSession>> {
    sqlx::query_as::<_, ExpiredSession>(
        r#"
        UPDATE sessions
        SET is_active = FALSE, expires_at = now()
        WHERE is_active AND last_active < $1
        RETURNING id, user_id, map_id
        "#,
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await
    .context("failed to expire old sessions")
}
