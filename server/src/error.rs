//! HTTP-facing errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::any::Any;
use tracing::error;

use crate::mcp::ProtocolError;
use crate::transport::TransportError;

/// Errors returned by HTTP handlers. Each renders as a JSON body with an `error` field.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid or missing session ID")]
    InvalidSession,

    #[error("Server is shutting down")]
    ShuttingDown,

    #[error("{0}")]
    InvalidMessage(#[from] ProtocolError),

    #[error("Failed to establish SSE connection")]
    Connect(#[source] TransportError),

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidSession | ApiError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
            ApiError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Connect(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Unauthorized => json!({
                "error": self.to_string(),
                "message": "Missing or invalid bearer token"
            }),
            ApiError::Connect(e) => json!({
                "error": self.to_string(),
                "message": e.to_string()
            }),
            ApiError::InvalidMessage(e) => json!({
                "error": self.to_string(),
                "code": e.code()
            }),
            ApiError::Internal(message) => json!({
                "error": self.to_string(),
                "message": message
            }),
            _ => json!({ "error": self.to_string() }),
        };

        if status.is_server_error() {
            error!("Request failed: {} ({})", self, body);
        }

        (status, Json(body)).into_response()
    }
}

/// Response for a panicking handler, for `CatchPanicLayer::custom`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(detail).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(error: ApiError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_invalid_session_body() {
        let (status, body) = body_json(ApiError::InvalidSession).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid or missing session ID" }));
    }

    #[tokio::test]
    async fn test_server_errors_carry_detail() {
        let (status, body) = body_json(ApiError::Connect(TransportError::StreamClosed)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to establish SSE connection");
        assert_eq!(body["message"], "Event stream closed by the client");

        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_invalid_message_carries_jsonrpc_code() {
        let (status, body) = body_json(ApiError::InvalidMessage(ProtocolError::Version)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], crate::mcp::jsonrpc::codes::INVALID_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("jsonrpc version"));

        let (_, body) = body_json(ApiError::InvalidMessage(ProtocolError::Parse(
            "EOF".to_string(),
        )))
        .await;
        assert_eq!(body["code"], crate::mcp::jsonrpc::codes::PARSE_ERROR);
    }
}
