//! Prometheus metrics endpoint

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};

use crate::AppState;
use crate::metrics::{CHAT_ROOMS_ACTIVE, REGISTRY, USERS_TOTAL};

/// Metrics endpoint handler
///
/// Refreshes the user and chat-room gauges, then returns every registered metric in
/// Prometheus text format.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.db.count_active_users().await {
        Ok(count) => USERS_TOTAL.set(count),
        Err(e) => tracing::warn!(error = %e, "Failed to refresh user gauge"),
    }
    CHAT_ROOMS_ACTIVE.set(state.chat_hub.active_rooms() as i64);

    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&REGISTRY.gather()) {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type())],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

/// `GET /metrics`; authentication is layered on by `build_router`
pub fn metrics_router() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics_handler))
}
