//! Feedback endpoint, forwarding to the configured issue tracker.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use ts_rs::TS;

use crate::feedback::{Feedback, FeedbackCategory};
use crate::state::AppState;
use crate::web::error::{ApiError, ApiErrorCode};
use crate::web::extractors::AuthPrincipal;

const TITLE_MIN_CHARS: usize = 5;
const TITLE_MAX_CHARS: usize = 100;
const DESCRIPTION_MIN_CHARS: usize = 10;
const DESCRIPTION_MAX_CHARS: usize = 1000;

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FeedbackRequest {
    pub title: String,
    pub description: String,
    pub category: FeedbackCategory,
}

/// `POST /api/feedback` — Forward a submission to the issue tracker.
/// Returns 503 when the tracker is not configured.
pub async fn submit_feedback(
    State(state): State<AppState>,
    _principal: AuthPrincipal,
    Json(body): Json<FeedbackRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let title_len = body.title.chars().count();
    if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&title_len) {
        return Err(ApiError::validation(format!(
            "title must be between {TITLE_MIN_CHARS} and {TITLE_MAX_CHARS} characters"
        )));
    }
    let description_len = body.description.chars().count();
    if !(DESCRIPTION_MIN_CHARS..=DESCRIPTION_MAX_CHARS).contains(&description_len) {
        return Err(ApiError::validation(format!(
            "description must be between {DESCRIPTION_MIN_CHARS} and {DESCRIPTION_MAX_CHARS} characters"
        )));
    }

    let forwarder = state.feedback.as_ref().ok_or_else(|| {
        ApiError::new(
            ApiErrorCode::GithubNotConfigured,
            "Feedback forwarding is not configured",
        )
    })?;

    let issue_url = forwarder
        .forward(&Feedback {
            title: body.title,
            description: body.description,
            category: body.category,
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "feedback forwarding failed");
            ApiError::internal_error("Failed to forward feedback")
        })?;

    Ok((StatusCode::CREATED, Json(json!({ "issueUrl": issue_url }))))
}
