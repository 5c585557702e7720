//! Single-route forwarding gateway.
//!
//! Relays caller-specified GET requests to third-party HTTP(S) APIs so a
//! browser client can reach them without cross-origin restrictions. Every
//! request runs the same pipeline: rate limit, URL validation, network
//! policy, header composition, then a bounded upstream forward.

pub mod config;
pub mod error;
pub mod forward;
pub mod handlers;
pub mod headers;
pub mod metrics;
pub mod models;
pub mod policy;
pub mod rate_limit;
pub mod state;
pub mod target;

use axum::{Router, routing::get};
use std::sync::Arc;

use crate::handlers::{health_handler, metrics_handler, proxy_handler};
use crate::state::AppState;

pub const PROXY_ROUTE: &str = "/api/fhir-proxy";

//creating the router with routes
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(PROXY_ROUTE, get(proxy_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
