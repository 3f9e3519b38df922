//! WebSocket broadcast relay for a small group chat: every message a client
//! submits is fanned out to every connected client, sender included.

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use uuid::Uuid;

pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod registry;
pub mod relay;
pub mod ws;

use crate::metrics::RelayMetrics;
use crate::relay::ChatRelay;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
pub struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<ChatRelay>,
    pub metrics: Arc<RelayMetrics>,
}

/// Build the relay router: the chat WebSocket plus health/metrics endpoints.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(handlers::websocket_handler))
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
