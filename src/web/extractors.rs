//! Axum extractors for authentication and authorization.
//!
//! Full accounts present a JWT bearer token; guests send `X-User-ID` until
//! they migrate to JWTs. Both resolve to the same [`AuthPrincipal`], so
//! handlers and engines never care which identity source was used.

use axum::extract::FromRequestParts;
use axum::http::header;
use http::request::Parts;
use uuid::Uuid;

use crate::data;
use crate::data::models::UserRole;
use crate::state::AppState;
use crate::web::error::ApiError;

const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct AuthPrincipal {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl FromRequestParts<AppState> for AuthPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // JWT bearer token wins when both identity sources are present
        if let Some(token) = bearer_token(parts) {
            let claims = state
                .jwt
                .verify(&token)
                .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;
            return Ok(AuthPrincipal {
                user_id: claims.sub,
                role: claims.role,
            });
        }

        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| ApiError::unauthorized("No credentials"))?;

        let user = data::users::get_user(&state.db_pool, user_id)
            .await
            .map_err(|e| crate::web::error::db_error("principal lookup", e))?
            .ok_or_else(|| ApiError::unauthorized("Unknown user"))?;

        Ok(AuthPrincipal {
            user_id: user.id,
            role: user.role,
        })
    }
}

/// Extractor that requires an authenticated admin principal.
///
/// Rejects with 401 if not authenticated, 403 if not admin.
pub struct AdminPrincipal(pub AuthPrincipal);

impl FromRequestParts<AppState> for AdminPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = AuthPrincipal::from_request_parts(parts, state).await?;
        if !principal.role.is_admin() {
            return Err(ApiError::forbidden("Admin access required"));
        }
        Ok(AdminPrincipal(principal))
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_owned())
}
