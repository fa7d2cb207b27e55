//! Map endpoints. Creation is admin-only; maps are isolated worlds.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use ts_rs::TS;
use uuid::Uuid;

use crate::data;
use crate::errors::ServiceError;
use crate::state::AppState;
use crate::web::dto::MapDto;
use crate::web::error::{ApiError, db_error};
use crate::web::extractors::AdminPrincipal;

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateMapRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// `POST /api/maps` — Create a map (admin only).
pub async fn create_map(
    State(state): State<AppState>,
    AdminPrincipal(principal): AdminPrincipal,
    Json(body): Json<CreateMapRequest>,
) -> Result<(StatusCode, Json<MapDto>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }

    let map = data::maps::create_map(
        &state.db_pool,
        Uuid::new_v4(),
        &body.name,
        body.description.as_deref(),
        principal.user_id,
    )
    .await
    .map_err(|e| db_error("map creation", e))?;

    Ok((StatusCode::CREATED, Json(MapDto::from(&map))))
}

/// `GET /api/maps` — List active maps.
pub async fn list_maps(State(state): State<AppState>) -> Result<Json<Vec<MapDto>>, ApiError> {
    let maps = data::maps::list_maps(&state.db_pool)
        .await
        .map_err(|e| db_error("map listing", e))?;
    Ok(Json(maps.iter().map(MapDto::from).collect()))
}

/// `GET /api/maps/{mid}` — Read a map.
pub async fn get_map(
    State(state): State<AppState>,
    Path(map_id): Path<Uuid>,
) -> Result<Json<MapDto>, ApiError> {
    let map = data::maps::get_map(&state.db_pool, map_id)
        .await
        .map_err(|e| db_error("map read", e))?
        .ok_or(ServiceError::MapNotFound)?;
    Ok(Json(MapDto::from(&map)))
}
