//! Profile endpoints: guest creation, reads, partial updates, avatar upload.

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use ts_rs::TS;
use uuid::Uuid;

use crate::data::models::AccountType;
use crate::data::{self, users::NewUser};
use crate::images::ImageKind;
use crate::limiter::Action;
use crate::state::AppState;
use crate::web::dto::UserProfileDto;
use crate::web::error::{ApiError, db_error};
use crate::web::extractors::AuthPrincipal;
use crate::web::rate_limit::{RateLimitHeaders, enforce};

const DISPLAY_NAME_MIN_CHARS: usize = 3;
const DISPLAY_NAME_MAX_CHARS: usize = 50;
const ABOUT_ME_MAX_CHARS: usize = 1000;

pub fn validate_display_name(name: &str) -> Result<(), ApiError> {
    let len = name.chars().count();
    if !(DISPLAY_NAME_MIN_CHARS..=DISPLAY_NAME_MAX_CHARS).contains(&len) {
        return Err(ApiError::validation(format!(
            "displayName must be between {DISPLAY_NAME_MIN_CHARS} and {DISPLAY_NAME_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

pub fn validate_about_me(about_me: &str) -> Result<(), ApiError> {
    if about_me.chars().count() > ABOUT_ME_MAX_CHARS {
        return Err(ApiError::validation(format!(
            "aboutMe must be at most {ABOUT_ME_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateProfileRequest {
    pub display_name: String,
    #[serde(default)]
    pub account_type: Option<AccountType>,
    #[serde(default)]
    pub about_me: Option<String>,
}

/// `POST /api/users/profile` — Create a guest profile.
pub async fn create_profile(
    State(state): State<AppState>,
    Json(body): Json<CreateProfileRequest>,
) -> Result<(StatusCode, Json<UserProfileDto>), ApiError> {
    if body.account_type.is_some_and(|t| t != AccountType::Guest) {
        return Err(ApiError::validation(
            "only guest profiles can be created here; full accounts sign up",
        ));
    }
    validate_display_name(&body.display_name)?;
    if let Some(about_me) = body.about_me.as_deref() {
        validate_about_me(about_me)?;
    }

    let user = data::users::create_user(
        &state.db_pool,
        NewUser {
            id: Uuid::new_v4(),
            display_name: &body.display_name,
            email: None,
            password_hash: None,
            about_me: body.about_me.as_deref(),
            account_type: AccountType::Guest,
        },
    )
    .await
    .map_err(|e| db_error("profile creation", e))?;

    Ok((StatusCode::CREATED, Json(UserProfileDto::from(&user))))
}

/// `GET /api/users/profile` — Read the caller's own profile.
pub async fn get_profile(
    State(state): State<AppState>,
    principal: AuthPrincipal,
) -> Result<Json<UserProfileDto>, ApiError> {
    let user = data::users::get_user(&state.db_pool, principal.user_id)
        .await
        .map_err(|e| db_error("profile read", e))?
        .ok_or_else(|| ApiError::unauthorized("Unknown user"))?;

    Ok(Json(UserProfileDto::from(&user)))
}

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub about_me: Option<String>,
}

/// `PUT /api/users/profile` — Partial update. Guests may only change `aboutMe`.
pub async fn update_profile(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<(RateLimitHeaders, Json<UserProfileDto>), ApiError> {
    let rate = enforce(&state.limiter, principal.user_id, Action::UpdateProfile)?;

    let user = data::users::get_user(&state.db_pool, principal.user_id)
        .await
        .map_err(|e| db_error("profile read", e))?
        .ok_or_else(|| ApiError::unauthorized("Unknown user"))?;

    if user.account_type == AccountType::Guest && body.display_name.is_some() {
        return Err(ApiError::forbidden("Guests may only update aboutMe"));
    }
    if let Some(display_name) = body.display_name.as_deref() {
        validate_display_name(display_name)?;
    }
    if let Some(about_me) = body.about_me.as_deref() {
        validate_about_me(about_me)?;
    }

    let updated = data::users::update_profile(
        &state.db_pool,
        principal.user_id,
        body.display_name.as_deref(),
        body.about_me.as_deref(),
    )
    .await
    .map_err(|e| db_error("profile update", e))?
    .ok_or_else(|| ApiError::unauthorized("Unknown user"))?;

    Ok((rate, Json(UserProfileDto::from(&updated))))
}

/// `POST /api/users/avatar` — Multipart avatar upload (`avatar` field,
/// jpeg/png, at most 2 MB).
pub async fn upload_avatar(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    mut multipart: Multipart,
) -> Result<(RateLimitHeaders, Json<Value>), ApiError> {
    let rate = enforce(&state.limiter, principal.user_id, Action::UpdateAvatar)?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid_request(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some("avatar") {
            let content_type = field.content_type().unwrap_or_default().to_owned();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::invalid_request(format!("failed to read upload: {e}")))?;
            upload = Some((content_type, bytes.to_vec()));
            break;
        }
    }

    let (content_type, bytes) = upload.ok_or_else(|| {
        ApiError::new(
            crate::web::error::ApiErrorCode::MissingFile,
            "Missing `avatar` file field",
        )
    })?;

    let stored = state
        .images
        .store(ImageKind::Avatar, &content_type, &bytes)
        .await?;

    data::users::set_avatar_url(&state.db_pool, principal.user_id, &stored.url)
        .await
        .map_err(|e| db_error("avatar update", e))?
        .ok_or_else(|| ApiError::unauthorized("Unknown user"))?;

    Ok((rate, Json(json!({ "avatarUrl": stored.url }))))
}
