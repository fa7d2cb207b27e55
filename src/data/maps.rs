//! Database query functions for maps.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::Map;

/// Insert a new map.
pub async fn create_map(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    description: Option<&str>,
    created_by: Uuid,
) -> Result<Map> {
    sqlx::query_as::<_, Map>(
        r#"
        INSERT INTO maps (id, name, description, created_by)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .context("failed to create map")
}

/// Fetch a map by id.
pub async fn get_map(pool: &PgPool, id: Uuid) -> Result<Option<Map>> {
    sqlx::query_as::<_, Map>("SELECT * FROM maps WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to get map")
}

/// List all active maps, newest first.
pub async fn list_maps(pool: &PgPool) -> Result<Vec<Map>> {
    sqlx::query_as::<_, Map>("SELECT * FROM maps WHERE is_active ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
        .context("failed to list maps")
}

/// Soft-delete a map. Returns whether a row was affected.
#[allow(dead_code)] // Available for admin map-retirement flow
pub async fn deactivate_map(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("UPDATE maps SET is_active = FALSE, updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to deactivate map")?;
    Ok(result.rows_affected() > 0)
}
