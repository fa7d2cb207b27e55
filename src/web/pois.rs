//! POI endpoints: CRUD, bounds queries, join/leave, participants.

use axum::extract::{FromRequest, Multipart, Path, Query, Request, State};
use axum::http::{StatusCode, header};
use axum::{Json, RequestExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use ts_rs::TS;
use uuid::Uuid;

use crate::data::models::{Bounds, LatLng};
use crate::events::ParticipantInfo;
use crate::images::ImageKind;
use crate::limiter::Action;
use crate::poi::{CreatePoiInput, PoiUpdate};
use crate::state::AppState;
use crate::web::dto::PoiDto;
use crate::web::error::ApiError;
use crate::web::extractors::AuthPrincipal;
use crate::web::rate_limit::{RateLimitHeaders, enforce};

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PoiQuery {
    pub map_id: Uuid,
    #[serde(default)]
    pub min_lat: Option<f64>,
    #[serde(default)]
    pub max_lat: Option<f64>,
    #[serde(default)]
    pub min_lng: Option<f64>,
    #[serde(default)]
    pub max_lng: Option<f64>,
}

/// `GET /api/pois?mapId=...[&minLat&maxLat&minLng&maxLng]` — List POIs,
/// optionally restricted to a bounding box.
pub async fn list_pois(
    State(state): State<AppState>,
    Query(query): Query<PoiQuery>,
) -> Result<Json<Vec<PoiDto>>, ApiError> {
    let bounds = match (query.min_lat, query.max_lat, query.min_lng, query.max_lng) {
        (None, None, None, None) => None,
        (Some(min_lat), Some(max_lat), Some(min_lng), Some(max_lng)) => Some(Bounds {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }),
        _ => {
            return Err(ApiError::invalid_request(
                "bounds require all of minLat, maxLat, minLng, maxLng",
            ));
        }
    };

    let pois = match bounds {
        Some(bounds) => state.pois.list_in_bounds(query.map_id, bounds).await?,
        None => state.pois.list_by_map(query.map_id).await?,
    };

    Ok(Json(
        pois.iter()
            .map(|poi| PoiDto::from_poi(poi, state.pois.participant_count(poi.id)))
            .collect(),
    ))
}

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreatePoiRequest {
    pub map_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub position: LatLng,
    #[serde(default)]
    pub max_participants: Option<i32>,
    /// Must match the authenticated principal when present.
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

/// An uploaded POI image, parsed out of a multipart request.
struct PoiImage {
    content_type: String,
    bytes: Vec<u8>,
}

/// `POST /api/pois` — Create a POI. Accepts plain JSON or multipart with an
/// optional `image` file; the image is stored before any durable write.
pub async fn create_poi(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    request: Request,
) -> Result<(StatusCode, RateLimitHeaders, Json<PoiDto>), ApiError> {
    let rate = enforce(&state.limiter, principal.user_id, Action::CreatePoi)?;

    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (body, image) = if is_multipart {
        let multipart = request
            .extract::<Multipart, _>()
            .await
            .map_err(|e| ApiError::invalid_request(format!("malformed multipart body: {e}")))?;
        parse_multipart_poi(multipart).await?
    } else {
        let Json(body) = Json::<CreatePoiRequest>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::invalid_request(e.to_string()))?;
        (body, None)
    };

    if body.created_by.is_some_and(|id| id != principal.user_id) {
        return Err(ApiError::forbidden("createdBy does not match credentials"));
    }

    let stored = match image {
        Some(image) => Some(
            state
                .images
                .store(ImageKind::Poi, &image.content_type, &image.bytes)
                .await?,
        ),
        None => None,
    };

    let poi = state
        .pois
        .create_poi(CreatePoiInput {
            map_id: body.map_id,
            name: body.name,
            description: body.description.unwrap_or_default(),
            position: body.position,
            max_participants: body.max_participants,
            created_by: principal.user_id,
            image_url: stored.as_ref().map(|s| s.url.clone()),
            thumbnail_url: stored.as_ref().and_then(|s| s.thumbnail_url.clone()),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        rate,
        Json(PoiDto::from_poi(&poi, state.pois.participant_count(poi.id))),
    ))
}

/// Assemble a [`CreatePoiRequest`] from multipart fields. Positions arrive
/// as separate `lat`/`lng` text fields.
async fn parse_multipart_poi(
    mut multipart: Multipart,
) -> Result<(CreatePoiRequest, Option<PoiImage>), ApiError> {
    let mut map_id = None;
    let mut name = None;
    let mut description = None;
    let mut lat = None;
    let mut lng = None;
    let mut max_participants = None;
    let mut created_by = None;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid_request(format!("malformed multipart body: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_owned();
        if field_name == "image" {
            let content_type = field.content_type().unwrap_or_default().to_owned();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::invalid_request(format!("failed to read upload: {e}")))?;
            image = Some(PoiImage {
                content_type,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ApiError::invalid_request(format!("failed to read field: {e}")))?;
        match field_name.as_str() {
            "mapId" => map_id = Some(parse_field(&field_name, &text)?),
            "name" => name = Some(text),
            "description" => description = Some(text),
            "lat" => lat = Some(parse_field(&field_name, &text)?),
            "lng" => lng = Some(parse_field(&field_name, &text)?),
            "maxParticipants" => max_participants = Some(parse_field(&field_name, &text)?),
            "createdBy" => created_by = Some(parse_field(&field_name, &text)?),
            _ => {}
        }
    }

    let request = CreatePoiRequest {
        map_id: map_id.ok_or_else(|| ApiError::invalid_request("missing mapId field"))?,
        name: name.ok_or_else(|| ApiError::invalid_request("missing name field"))?,
        description,
        position: LatLng {
            lat: lat.ok_or_else(|| ApiError::invalid_request("missing lat field"))?,
            lng: lng.ok_or_else(|| ApiError::invalid_request("missing lng field"))?,
        },
        max_participants,
        created_by,
    };
    Ok((request, image))
}

fn parse_field<T: std::str::FromStr>(name: &str, text: &str) -> Result<T, ApiError> {
    text.parse()
        .map_err(|_| ApiError::invalid_request(format!("invalid {name} field")))
}

/// `GET /api/pois/{pid}` — Read a POI.
pub async fn get_poi(
    State(state): State<AppState>,
    Path(poi_id): Path<Uuid>,
) -> Result<Json<PoiDto>, ApiError> {
    let poi = state.pois.get_poi(poi_id).await?;
    Ok(Json(PoiDto::from_poi(
        &poi,
        state.pois.participant_count(poi_id),
    )))
}

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdatePoiRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub max_participants: Option<i32>,
}

/// `PUT /api/pois/{pid}` — Partial update. Creator or admin only.
pub async fn update_poi(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(poi_id): Path<Uuid>,
    Json(body): Json<UpdatePoiRequest>,
) -> Result<(RateLimitHeaders, Json<PoiDto>), ApiError> {
    let rate = enforce(&state.limiter, principal.user_id, Action::UpdatePoi)?;

    let poi = state
        .pois
        .update_poi(
            poi_id,
            PoiUpdate {
                name: body.name,
                description: body.description,
                max_participants: body.max_participants,
            },
            principal.user_id,
            principal.role,
        )
        .await?;

    Ok((
        rate,
        Json(PoiDto::from_poi(&poi, state.pois.participant_count(poi_id))),
    ))
}

/// `DELETE /api/pois/{pid}` — Delete a POI. Creator or admin only.
pub async fn delete_poi(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(poi_id): Path<Uuid>,
) -> Result<(RateLimitHeaders, Json<Value>), ApiError> {
    let rate = enforce(&state.limiter, principal.user_id, Action::DeletePoi)?;

    state
        .pois
        .delete_poi(poi_id, principal.user_id, principal.role)
        .await?;
    Ok((rate, Json(json!({ "success": true }))))
}

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ParticipationRequest {
    /// Must match the authenticated principal when present.
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ParticipationResponse {
    pub poi: PoiDto,
    pub participants: Vec<ParticipantInfo>,
}

/// `POST /api/pois/{pid}/join` — Join a POI, implicitly leaving any other.
pub async fn join_poi(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(poi_id): Path<Uuid>,
    Json(body): Json<ParticipationRequest>,
) -> Result<(RateLimitHeaders, Json<ParticipationResponse>), ApiError> {
    if body.user_id.is_some_and(|id| id != principal.user_id) {
        return Err(ApiError::forbidden("userId does not match credentials"));
    }
    let rate = enforce(&state.limiter, principal.user_id, Action::JoinPoi)?;

    let change = state
        .pois
        .join_poi(poi_id, principal.user_id, body.session_id)
        .await?;

    Ok((
        rate,
        Json(ParticipationResponse {
            poi: PoiDto::from_poi(&change.poi, change.participants.len()),
            participants: change.participants,
        }),
    ))
}

/// `POST /api/pois/{pid}/leave` — Leave a POI.
pub async fn leave_poi(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(poi_id): Path<Uuid>,
    Json(body): Json<ParticipationRequest>,
) -> Result<(RateLimitHeaders, Json<ParticipationResponse>), ApiError> {
    if body.user_id.is_some_and(|id| id != principal.user_id) {
        return Err(ApiError::forbidden("userId does not match credentials"));
    }
    let rate = enforce(&state.limiter, principal.user_id, Action::LeavePoi)?;

    let change = state
        .pois
        .leave_poi(poi_id, principal.user_id, body.session_id)
        .await?;

    Ok((
        rate,
        Json(ParticipationResponse {
            poi: PoiDto::from_poi(&change.poi, change.participants.len()),
            participants: change.participants,
        }),
    ))
}

/// `GET /api/pois/{pid}/participants` — Resolved participant list.
pub async fn list_participants(
    State(state): State<AppState>,
    Path(poi_id): Path<Uuid>,
) -> Result<Json<Vec<ParticipantInfo>>, ApiError> {
    state.pois.get_poi(poi_id).await?;
    let participants = state.pois.participants(poi_id).await?;
    Ok(Json(participants))
}
