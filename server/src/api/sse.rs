//! SSE session endpoints.
//!
//! - `GET <stream-path>` opens a session and streams its frames
//! - `POST <message-path>?sessionId=<id>` delivers one client message to it

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::header,
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::state::AppState;
use crate::transport::{Acknowledgement, SseStream, SseTransport, Transport};

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// GET <stream-path> - Open an SSE session.
pub async fn open_stream(State(state): State<AppState>) -> Result<Response, ApiError> {
    if state.is_draining() {
        return Err(ApiError::ShuttingDown);
    }

    let (transport, stream) = SseTransport::new(state.message_path());
    attach(&state, transport, stream).await
}

/// Register a new session and connect it to the protocol core.
///
/// The session is registered before it is connected and deregisters itself
/// when it closes. On failure nothing stays registered.
async fn attach(
    state: &AppState,
    transport: Arc<SseTransport>,
    stream: SseStream,
) -> Result<Response, ApiError> {
    let session_id = transport.id().to_string();

    if !state.sessions().insert(&transport) {
        return Err(ApiError::Internal(format!(
            "Session ID already in use: {}",
            session_id
        )));
    }
    let sessions = state.sessions().clone();
    let close_id = session_id.clone();
    transport.set_close_handler(Arc::new(move || {
        sessions.remove(&close_id);
    }));

    // Shutdown may have started while registering; the drain could have missed us.
    if state.is_draining() {
        let _ = transport.close().await;
        state.sessions().remove(&session_id);
        return Err(ApiError::ShuttingDown);
    }

    if let Err(e) = state.server().connect(transport.clone()).await {
        error!(session_id = %session_id, "Failed to connect SSE session: {}", e);
        let _ = transport.close().await;
        // A transport that was already closed never calls its close handler.
        state.sessions().remove(&session_id);
        return Err(ApiError::Connect(e));
    }

    info!(
        session_id = %session_id,
        "SSE client connected (open sessions: {})",
        state.sessions().len()
    );
    Ok(event_stream(stream, state.keep_alive()))
}

fn event_stream(stream: SseStream, keep_alive: Option<Duration>) -> Response {
    let headers = [(header::CONNECTION, "keep-alive")];
    match keep_alive {
        Some(interval) => (
            headers,
            Sse::new(stream).keep_alive(KeepAlive::new().interval(interval).text("keep-alive")),
        )
            .into_response(),
        None => (headers, Sse::new(stream)).into_response(),
    }
}

/// POST <message-path>?sessionId=<id> - Deliver a message to a session.
pub async fn post_message(
    State(state): State<AppState>,
    query: Result<Query<MessageQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Acknowledgement, ApiError> {
    let session_id = query.ok().and_then(|Query(query)| query.session_id);

    let Some(transport) = session_id
        .as_deref()
        .and_then(|id| state.sessions().lookup(id))
    else {
        warn!(
            "Message for unknown session: {}",
            session_id.as_deref().unwrap_or("<missing>")
        );
        return Err(ApiError::InvalidSession);
    };

    Ok(transport.receive(&body))
}
