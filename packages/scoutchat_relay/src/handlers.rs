use axum::{
    Json,
    extract::{State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::metrics::HealthStatus;
use crate::ws;

pub async fn websocket_handler(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> Response {
    let relay = state.relay.clone();
    upgrade.on_upgrade(move |socket| ws::handle_chat_ws(socket, relay))
}

/// Health check endpoint - returns relay status
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = state.metrics.snapshot();

    let status = if metrics.messages.dropped == 0 {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthStatus {
        status: status.to_string(),
        connections: metrics.connections.active,
        uptime_secs: metrics.uptime_secs,
    })
}

/// Liveness probe - returns 200 if the relay is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

/// Metrics endpoint - returns detailed relay metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}
