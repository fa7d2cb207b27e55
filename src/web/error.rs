//! Standardized API error responses.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use ts_rs::TS;

use crate::errors::ServiceError;
use crate::limiter::RateLimitExceeded;
use crate::web::rate_limit::rate_limit_headers;

/// Machine-readable error code for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ApiErrorCode {
    InvalidRequest,
    ValidationError,
    InvalidFileType,
    FileTooLarge,
    MissingFile,
    Unauthorized,
    InvalidCredentials,
    Forbidden,
    SessionNotFound,
    PoiNotFound,
    MapNotFound,
    UserNotFound,
    DuplicateLocation,
    CapacityExceeded,
    AlreadyJoined,
    UserAlreadyInMap,
    EmailInUse,
    RateLimitExceeded,
    GithubNotConfigured,
    InternalError,
}

/// Standardized error response for all API endpoints.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ApiErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (validation errors, field info, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Rate-limit context for 429s; rendered as headers, not body.
    #[serde(skip)]
    #[ts(skip)]
    rate_limit: Option<RateLimitExceeded>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            rate_limit: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InvalidRequest, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::ValidationError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Forbidden, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InternalError, message)
    }

    /// Login failure. The text is identical for unknown email and wrong
    /// password so the response does not leak which one it was.
    pub fn invalid_credentials() -> Self {
        Self::new(ApiErrorCode::InvalidCredentials, "Invalid email or password")
    }

    pub fn rate_limited(exceeded: RateLimitExceeded) -> Self {
        let mut error = Self::new(ApiErrorCode::RateLimitExceeded, "Rate limit exceeded");
        error.rate_limit = Some(exceeded);
        error
    }

    fn status_code(&self) -> StatusCode {
        match self.code {
            ApiErrorCode::InvalidRequest
            | ApiErrorCode::ValidationError
            | ApiErrorCode::InvalidFileType
            | ApiErrorCode::FileTooLarge
            | ApiErrorCode::MissingFile => StatusCode::BAD_REQUEST,
            ApiErrorCode::Unauthorized | ApiErrorCode::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ApiErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ApiErrorCode::SessionNotFound
            | ApiErrorCode::PoiNotFound
            | ApiErrorCode::MapNotFound
            | ApiErrorCode::UserNotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::DuplicateLocation
            | ApiErrorCode::CapacityExceeded
            | ApiErrorCode::AlreadyJoined
            | ApiErrorCode::UserAlreadyInMap
            | ApiErrorCode::EmailInUse => StatusCode::CONFLICT,
            ApiErrorCode::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiErrorCode::GithubNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let rate_limit = self.rate_limit.as_ref().map(|exceeded| {
            // Retry-After rounds up so clients never retry early
            let retry_secs = exceeded.retry_after.as_secs_f64().ceil().max(1.0) as u64;
            (rate_limit_headers(&exceeded.status), retry_secs)
        });

        let mut response = (status, Json(self)).into_response();
        if let Some((headers, retry_secs)) = rate_limit {
            response.headers_mut().extend(headers);
            if let Ok(value) = HeaderValue::from_str(&retry_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::SessionNotFound => {
                Self::new(ApiErrorCode::SessionNotFound, "Session not found")
            }
            ServiceError::PoiNotFound => Self::new(ApiErrorCode::PoiNotFound, "POI not found"),
            ServiceError::MapNotFound => Self::new(ApiErrorCode::MapNotFound, "Map not found"),
            ServiceError::UserNotFound => Self::new(ApiErrorCode::UserNotFound, "User not found"),
            ServiceError::UserAlreadyInMap => Self::new(
                ApiErrorCode::UserAlreadyInMap,
                "User already has an active session in this map",
            ),
            ServiceError::AlreadyJoined => Self::new(
                ApiErrorCode::AlreadyJoined,
                "User is already a participant of this POI",
            ),
            ServiceError::NotJoined => {
                Self::validation("User is not a participant of this POI")
            }
            ServiceError::CapacityExceeded => {
                Self::new(ApiErrorCode::CapacityExceeded, "POI is at capacity")
            }
            ServiceError::DuplicateLocation => Self::new(
                ApiErrorCode::DuplicateLocation,
                "A POI already exists at this location",
            ),
            ServiceError::EmailInUse => {
                Self::new(ApiErrorCode::EmailInUse, "Email is already in use")
            }
            ServiceError::Validation(message) => Self::validation(message),
            ServiceError::Forbidden => Self::forbidden("Not allowed"),
            ServiceError::Database(e) => db_error("engine operation", e),
        }
    }
}

impl From<crate::images::ImageError> for ApiError {
    fn from(err: crate::images::ImageError) -> Self {
        use crate::images::ImageError;
        match err {
            ImageError::InvalidType(_) => Self::new(ApiErrorCode::InvalidFileType, err.to_string()),
            ImageError::TooLarge { .. } => Self::new(ApiErrorCode::FileTooLarge, err.to_string()),
            ImageError::Io(e) => {
                tracing::error!(error = %e, "image store failure");
                Self::internal_error("Image upload failed")
            }
        }
    }
}

/// Convert database errors to ApiError without leaking internals.
pub fn db_error(context: &str, error: anyhow::Error) -> ApiError {
    tracing::error!(error = %error, context = context, "Database error");
    ApiError::internal_error(format!("{} failed", context))
}
