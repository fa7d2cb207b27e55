//! Signup, login, logout, and session introspection endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use crate::auth::{hash_password, verify_password};
use crate::data::models::AccountType;
use crate::data::{self, is_unique_violation, users::NewUser};
use crate::state::AppState;
use crate::web::dto::UserProfileDto;
use crate::web::error::{ApiError, db_error};
use crate::web::extractors::AuthPrincipal;
use crate::web::users::{validate_about_me, validate_display_name};

const PASSWORD_MIN_CHARS: usize = 8;

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    #[serde(default)]
    pub about_me: Option<String>,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfileDto,
}

/// `POST /api/auth/signup` — Create a full account and issue a token.
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    validate_display_name(&body.display_name)?;
    if let Some(about_me) = body.about_me.as_deref() {
        validate_about_me(about_me)?;
    }
    if !body.email.contains('@') {
        return Err(ApiError::validation("email is not valid"));
    }
    if body.password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(ApiError::validation(format!(
            "password must be at least {PASSWORD_MIN_CHARS} characters"
        )));
    }

    let password_hash = hash_password(&body.password)
        .map_err(|e| db_error("password hashing", e))?;

    let user = data::users::create_user(
        &state.db_pool,
        NewUser {
            id: Uuid::new_v4(),
            display_name: &body.display_name,
            email: Some(&body.email),
            password_hash: Some(&password_hash),
            about_me: body.about_me.as_deref(),
            account_type: AccountType::Full,
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e, "users_email_key") {
            ApiError::new(
                crate::web::error::ApiErrorCode::EmailInUse,
                "Email is already in use",
            )
        } else {
            db_error("signup", e)
        }
    })?;

    let token = state
        .jwt
        .issue(&user)
        .map_err(|e| ApiError::internal_error(format!("failed to issue token: {e}")))?;

    info!(user_id = %user.id, "full account created");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserProfileDto::from(&user),
        }),
    ))
}

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/login` — Verify credentials and issue a token.
///
/// Unknown email and wrong password produce byte-identical responses.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = data::users::get_user_by_email(&state.db_pool, &body.email)
        .await
        .map_err(|e| db_error("login", e))?
        .ok_or_else(ApiError::invalid_credentials)?;

    let hash = user
        .password_hash
        .as_deref()
        .ok_or_else(ApiError::invalid_credentials)?;
    if !verify_password(&body.password, hash) {
        return Err(ApiError::invalid_credentials());
    }

    let token = state
        .jwt
        .issue(&user)
        .map_err(|e| ApiError::internal_error(format!("failed to issue token: {e}")))?;

    if let Err(e) = data::users::touch_last_active(&state.db_pool, user.id).await {
        tracing::warn!(error = %e, "failed to touch last_active on login");
    }

    Ok(Json(AuthResponse {
        token,
        user: UserProfileDto::from(&user),
    }))
}

/// `POST /api/auth/logout` — Clear the caller's rate-limit state. Tokens
/// are stateless; the client discards its copy.
pub async fn logout(
    State(state): State<AppState>,
    principal: AuthPrincipal,
) -> Json<Value> {
    state.limiter.clear_user(principal.user_id);
    Json(json!({ "success": true }))
}

/// `GET /api/auth/me` — Return the current authenticated user's profile.
pub async fn me(
    State(state): State<AppState>,
    principal: AuthPrincipal,
) -> Result<Json<UserProfileDto>, ApiError> {
    let user = data::users::get_user(&state.db_pool, principal.user_id)
        .await
        .map_err(|e| db_error("profile read", e))?
        .ok_or_else(|| ApiError::unauthorized("Unknown user"))?;

    Ok(Json(UserProfileDto::from(&user)))
}
