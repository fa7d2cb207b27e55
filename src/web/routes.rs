//! Router assembly and shared middleware for the HTTP API.

use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    response::{Json, Response},
    routing::{get, post, put},
};
use serde_json::{Value, json};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::{
    classify::ServerErrorsFailureClass, compression::CompressionLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{Span, debug, warn};

use crate::state::AppState;
use crate::web::{auth, feedback, maps, pois, sessions, users, ws};

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route(
            "/users/profile",
            post(users::create_profile)
                .get(users::get_profile)
                .put(users::update_profile),
        )
        .route("/users/avatar", post(users::upload_avatar))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/sessions", post(sessions::create_session))
        .route(
            "/sessions/{sid}",
            get(sessions::get_session).delete(sessions::end_session),
        )
        .route("/sessions/{sid}/avatar", put(sessions::update_avatar))
        .route("/sessions/{sid}/heartbeat", post(sessions::heartbeat))
        .route("/maps", post(maps::create_map).get(maps::list_maps))
        .route("/maps/{mid}", get(maps::get_map))
        .route("/maps/{mid}/sessions", get(sessions::list_map_sessions))
        .route("/pois", get(pois::list_pois).post(pois::create_poi))
        .route(
            "/pois/{pid}",
            get(pois::get_poi)
                .put(pois::update_poi)
                .delete(pois::delete_poi),
        )
        .route("/pois/{pid}/join", post(pois::join_poi))
        .route("/pois/{pid}/leave", post(pois::leave_poi))
        .route("/pois/{pid}/participants", get(pois::list_participants))
        .route("/feedback", post(feedback::submit_feedback))
        .route("/ws", get(ws::world_ws))
        .with_state(app_state.clone());

    Router::new()
        .nest("/api", api_router)
        .nest_service("/uploads", ServeDir::new(&app_state.upload_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer((
            CompressionLayer::new()
                .zstd(true)
                .br(true)
                .gzip(true)
                .quality(tower_http::CompressionLevel::Fastest),
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    tracing::debug_span!("request", path = request.uri().path())
                })
                .on_request(())
                .on_body_chunk(())
                .on_eos(())
                .on_response(
                    |response: &Response<Body>, latency: Duration, _span: &Span| {
                        let latency_threshold = if cfg!(debug_assertions) {
                            Duration::from_millis(100)
                        } else {
                            Duration::from_millis(1000)
                        };

                        let (latency_str, status) = (
                            format!("{latency:.2?}"),
                            format!(
                                "{} {}",
                                response.status().as_u16(),
                                response.status().canonical_reason().unwrap_or("??")
                            ),
                        );

                        if latency > latency_threshold {
                            warn!(latency = latency_str, status = status, "Response");
                        } else {
                            debug!(latency = latency_str, status = status, "Response");
                        }
                    },
                )
                .on_failure(
                    |error: ServerErrorsFailureClass, latency: Duration, _span: &Span| {
                        warn!(
                            error = ?error,
                            latency = format!("{latency:.2?}"),
                            "Request failed"
                        );
                    },
                ),
            TimeoutLayer::new(Duration::from_secs(10)),
        ))
}

/// `GET /api/health` — Build and liveness info.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "commit": env!("GIT_COMMIT_SHORT"),
    }))
}

/// `GET /api/status` — Self-reported status of each registered service.
async fn status(State(state): State<AppState>) -> Json<Value> {
    let services: serde_json::Map<String, Value> = state
        .service_statuses
        .all()
        .into_iter()
        .map(|(name, status)| (name, serde_json::to_value(status).unwrap_or(Value::Null)))
        .collect();

    Json(json!({ "services": services }))
}
