//! Stateless JSON-RPC endpoint.
//!
//! `POST <mcp-path>` answers one message in the response body, without a
//! session or an event stream.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

use crate::error::ApiError;
use crate::mcp::JsonRpcMessage;
use crate::state::AppState;

/// POST <mcp-path> - Handle one JSON-RPC message.
///
/// Requests are answered with `200` and the JSON-RPC reply. Notifications and
/// responses are accepted with `202`.
pub async fn mcp_post(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let message = JsonRpcMessage::from_slice(&body)?;
    debug!("MCP: Stateless {:?}", message.method());

    Ok(match state.server().handle_message(message).await {
        Some(reply) => Json(reply).into_response(),
        None => (StatusCode::ACCEPTED, Json(json!({ "success": true }))).into_response(),
    })
}
