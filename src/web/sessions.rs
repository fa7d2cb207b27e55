//! Session endpoints: create, read, move, heartbeat, end, list-by-map.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use ts_rs::TS;
use uuid::Uuid;

use crate::data::models::LatLng;
use crate::limiter::Action;
use crate::state::AppState;
use crate::web::dto::SessionDto;
use crate::web::error::ApiError;
use crate::web::extractors::AuthPrincipal;
use crate::web::rate_limit::{RateLimitHeaders, enforce};

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateSessionRequest {
    /// Must match the authenticated principal when present.
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub map_id: Uuid,
    pub avatar_position: LatLng,
}

/// `POST /api/sessions` — Join a map.
pub async fn create_session(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Json(body): Json<CreateSessionRequest>,
) -> Result<(StatusCode, RateLimitHeaders, Json<SessionDto>), ApiError> {
    if body.user_id.is_some_and(|id| id != principal.user_id) {
        return Err(ApiError::forbidden("userId does not match credentials"));
    }
    let rate = enforce(&state.limiter, principal.user_id, Action::CreateSession)?;

    let session = state
        .sessions
        .create_session(principal.user_id, body.map_id, body.avatar_position)
        .await?;

    Ok((StatusCode::CREATED, rate, Json(SessionDto::from(&session))))
}

/// `GET /api/sessions/{sid}` — Read a session.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionDto>, ApiError> {
    let session = state.sessions.get_session(session_id).await?;
    Ok(Json(SessionDto::from(&session)))
}

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateAvatarRequest {
    pub position: LatLng,
}

/// `PUT /api/sessions/{sid}/avatar` — Move the avatar.
pub async fn update_avatar(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(session_id): Path<Uuid>,
    Json(body): Json<UpdateAvatarRequest>,
) -> Result<(RateLimitHeaders, Json<Value>), ApiError> {
    let rate = enforce(&state.limiter, principal.user_id, Action::UpdateAvatar)?;

    let session = state.sessions.get_session(session_id).await?;
    if session.user_id != principal.user_id {
        return Err(ApiError::forbidden("session belongs to another user"));
    }

    state
        .sessions
        .update_position(session_id, body.position)
        .await?;
    Ok((rate, Json(json!({ "success": true }))))
}

/// `POST /api/sessions/{sid}/heartbeat` — Keep the session alive.
pub async fn heartbeat(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let session = state.sessions.get_session(session_id).await?;
    if session.user_id != principal.user_id {
        return Err(ApiError::forbidden("session belongs to another user"));
    }

    state.sessions.heartbeat(session_id).await?;
    Ok(Json(json!({ "success": true })))
}

/// `DELETE /api/sessions/{sid}` — Leave the map, evicting the user from
/// any POI they were in.
pub async fn end_session(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let session = state.sessions.get_session(session_id).await?;
    if session.user_id != principal.user_id && !principal.role.is_admin() {
        return Err(ApiError::forbidden("session belongs to another user"));
    }

    state.sessions.end_session(session_id).await?;
    Ok(Json(json!({ "success": true })))
}

/// `GET /api/maps/{mid}/sessions` — Active sessions on a map.
pub async fn list_map_sessions(
    State(state): State<AppState>,
    Path(map_id): Path<Uuid>,
) -> Result<Json<Vec<SessionDto>>, ApiError> {
    let sessions = state.sessions.list_active_by_map(map_id).await?;
    Ok(Json(sessions.iter().map(SessionDto::from).collect()))
}
