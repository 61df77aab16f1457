//! Mercury MCP server library.
//!
//! This module exposes the application builder for use in tests.

use axum::http::{header, Method};
use axum::{
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod shutdown;
pub mod state;
pub mod transport;

use config::Config;
use state::AppState;

/// Create the Axum application router.
///
/// This function is used both by the main server binary and by integration tests.
pub fn create_app(state: AppState, config: &Config, auth_config: auth::AuthConfig) -> Router {
    if auth_config.has_api_key_auth() {
        tracing::info!("Bearer token authentication enabled");
    } else {
        tracing::warn!("No MCP API key configured - every MCP request will be rejected");
    }

    // Build protected router (requires authentication)
    let protected_router = Router::new()
        .route(&config.stream_path, get(api::sse::open_stream))
        .route(&config.message_path, post(api::sse::post_message))
        .route(&config.mcp_path, post(api::mcp::mcp_post))
        .layer(middleware::from_fn(auth::auth_middleware))
        .layer(Extension(Arc::new(auth_config)));

    Router::new()
        .route("/healthz", get(health))
        .merge(protected_router)
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
                .allow_origin(Any),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({ "message": "OK" }))
}
