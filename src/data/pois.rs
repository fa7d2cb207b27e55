//! Database query functions for POIs.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{Bounds, LatLng, Poi};

/// Fields for a new POI row. The id is assigned by the caller.
pub struct NewPoi<'a> {
    pub id: Uuid,
    pub map_id: Uuid,
    pub name: &'a str,
    pub description: &'a str,
    pub position: LatLng,
    pub max_participants: i32,
    pub created_by: Uuid,
    pub image_url: Option<&'a str>,
    pub thumbnail_url: Option<&'a str>,
}

/// Insert a new POI.
pub async fn create_poi(pool: &PgPool, new: NewPoi<'_>) -> Result<Poi> {
    sqlx::query_as::<_, Poi>(
        r#"
        INSERT INTO pois (id, map_id, name, description, lat, lng,
                          max_participants, created_by, image_url, thumbnail_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(new.id)
    .bind(new.map_id)
    .bind(new.name)
    .bind(new.description)
    .bind(new.position.lat)
    .bind(new.position.lng)
    .bind(new.max_participants)
    .bind(new.created_by)
    .bind(new.image_url)
    .bind(new.thumbnail_url)
    .fetch_one(pool)
    .await
    .context("failed to create poi")
}

/// Fetch an active POI by id.
pub async fn get_poi(pool: &PgPool, id: Uuid) -> Result<Option<Poi>> {
    sqlx::query_as::<_, Poi>("SELECT * FROM pois WHERE id = $1 AND is_active")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to get poi")
}

/// List all active POIs on a map, oldest first.
pub async fn get_pois_by_map(pool: &PgPool, map_id: Uuid) -> Result<Vec<Poi>> {
    sqlx::query_as::<_, Poi>(
        "SELECT * FROM pois WHERE map_id = $1 AND is_active ORDER BY created_at",
    )
    .bind(map_id)
    .fetch_all(pool)
    .await
    .context("failed to list pois by map")
}

/// List active POIs on a map whose positions fall inside the box
/// (inclusive on all four edges).
pub async fn get_pois_in_bounds(pool: &PgPool, map_id: Uuid, bounds: Bounds) -> Result<Vec<Poi>> {
    sqlx::query_as::<_, Poi>(
        r#"
        SELECT * FROM pois
        WHERE map_id = $1 AND is_active
          AND lat BETWEEN $2 AND $3
          AND lng BETWEEN $4 AND $5
        ORDER BY created_at
        "#,
    )
    .bind(map_id)
    .bind(bounds.min_lat)
    .bind(bounds.max_lat)
    .bind(bounds.min_lng)
    .bind(bounds.max_lng)
    .fetch_all(pool)
    .await
    .context("failed to list pois in bounds")
}

/// Whether another active POI on the map sits at the same position, compared
/// at four decimal places (~11 m). `exclude_id` lets updates skip themselves.
pub async fn check_duplicate_location(
    pool: &PgPool,
    map_id: Uuid,
    position: LatLng,
    exclude_id: Option<Uuid>,
) -> Result<bool> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM pois
            WHERE map_id = $1 AND is_active
              AND round(lat::numeric, 4) = round($2::numeric, 4)
              AND round(lng::numeric, 4) = round($3::numeric, 4)
              AND ($4::uuid IS NULL OR id <> $4)
        )
        "#,
    )
    .bind(map_id)
    .bind(position.lat)
    .bind(position.lng)
    .bind(exclude_id)
    .fetch_one(pool)
    .await
    .context("failed to check duplicate poi location")
}

/// Partial update of name, description and capacity. `None` fields are left
/// untouched. Returns the updated row if the POI exists and is active.
pub async fn update_poi(
    pool: &PgPool,
    id: Uuid,
    name: Option<&str>,
    description: Option<&str>,
    max_participants: Option<i32>,
) -> Result<Option<Poi>> {
    sqlx::query_as::<_, Poi>(
        r#"
        UPDATE pois
        SET name = COALESCE($2, name),
            description = COALESCE($3, description),
            max_participants = COALESCE($4, max_participants),
            updated_at = now()
        WHERE id = $1 AND is_active
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(max_participants)
    .fetch_optional(pool)
    .await
    .context("failed to update poi")
}

/// Persist a discussion-timer transition. Passing `None` clears the start
/// time; only transitions are written, never per-tick updates.
pub async fn set_discussion_state(
    pool: &PgPool,
    id: Uuid,
    start_time: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE pois
        SET is_discussion_active = $2, discussion_start_time = $3, updated_at = now()
        WHERE id = $1 AND is_active
        "#,
    )
    .bind(id)
    .bind(start_time.is_some())
    .bind(start_time)
    .execute(pool)
    .await
    .context("failed to set discussion state")?;
    Ok(())
}

/// Soft-delete a POI. Returns whether a row was affected.
pub async fn delete_poi(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("UPDATE pois SET is_active = FALSE, updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete poi")?;
    Ok(result.rows_affected() > 0)
}
