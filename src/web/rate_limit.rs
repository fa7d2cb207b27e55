//! Rate-limit enforcement and header synthesis for mutating endpoints.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::ResponseParts;
use uuid::Uuid;

use crate::limiter::{Action, RateLimitStatus, RateLimiter};
use crate::web::error::ApiError;

pub const X_RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
pub const X_RATE_LIMIT_WINDOW: HeaderName = HeaderName::from_static("x-ratelimit-window");

/// Build the `X-RateLimit-*` header set for a check result.
pub fn rate_limit_headers(status: &RateLimitStatus) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(4);
    let mut insert = |name: HeaderName, value: String| {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    };
    insert(X_RATE_LIMIT_LIMIT, status.limit.to_string());
    insert(X_RATE_LIMIT_REMAINING, status.remaining.to_string());
    insert(X_RATE_LIMIT_RESET, status.reset.timestamp().to_string());
    insert(X_RATE_LIMIT_WINDOW, status.window.as_secs().to_string());
    headers
}

/// Response decoration carrying the rate-limit headers of an allowed check.
///
/// Returned by [`enforce`]; handlers include it in their response tuple so
/// every mutating response carries the observability headers.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitHeaders(pub RateLimitStatus);

impl axum::response::IntoResponseParts for RateLimitHeaders {
    type Error = std::convert::Infallible;

    fn into_response_parts(self, mut parts: ResponseParts) -> Result<ResponseParts, Self::Error> {
        parts.headers_mut().extend(rate_limit_headers(&self.0));
        Ok(parts)
    }
}

/// Check the limiter for a (user, action) pair.
///
/// On success the caller gets headers to attach; on exhaustion a ready 429
/// carrying `Retry-After` and the same header set.
pub fn enforce(
    limiter: &RateLimiter,
    user_id: Uuid,
    action: Action,
) -> Result<RateLimitHeaders, ApiError> {
    match limiter.check(user_id, action) {
        Ok(status) => Ok(RateLimitHeaders(status)),
        Err(exceeded) => Err(ApiError::rate_limited(exceeded)),
    }
}
