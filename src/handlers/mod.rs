//! HTTP surface of the bundled mock laboratory API.
//!
//! Routes mirror the real API paths, including their trailing slashes, and
//! are served from an [`InMemoryLabApi`].

pub mod customers;
pub mod orders;
pub mod parameters;
pub mod quotations;
pub mod samples;

use crate::client::InMemoryLabApi;
use axum::{response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub type ApiState = Arc<InMemoryLabApi>;

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "timestamp": chrono::Utc::now().to_rfc3339() }))
}

/// Full router with tracing and a per-request timeout.
pub fn api_router(state: ApiState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(parameters::parameter_routes())
        .merge(customers::customer_routes())
        .merge(orders::order_routes())
        .merge(quotations::quotation_routes())
        .merge(samples::sample_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
}
