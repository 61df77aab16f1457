//! Server-Sent Events session transport.
//!
//! Each SSE connection gets one [`SseTransport`] and one [`SseStream`]. The
//! transport produces events into an unbounded queue and the stream hands
//! them to axum's [`Sse`](axum::response::sse::Sse) response body. Client-to-server messages arrive out of band
//! through [`SseTransport::receive`], called by the POST handler.
//!
//! A transport moves `created -> connected -> closed` and never goes back.
//! Nothing is written to the queue once it is closed.

use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{sse::Event, IntoResponse, Response},
    Json,
};
use futures::Stream;
use parking_lot::Mutex;
use serde_json::json;
use std::convert::Infallible;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{CloseHandler, ErrorHandler, MessageHandler, Result, Transport, TransportError};
use crate::mcp::jsonrpc::JsonRpcMessage;

/// SSE event type of the handshake frame.
pub const ENDPOINT_EVENT: &str = "endpoint";
/// SSE event type of every JSON-RPC frame.
pub const MESSAGE_EVENT: &str = "message";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Created,
    Connected,
    Closed,
}

struct Inner {
    state: SessionState,
    sink: Option<mpsc::UnboundedSender<Event>>,
    on_message: Option<MessageHandler>,
    on_close: Option<CloseHandler>,
    on_error: Option<ErrorHandler>,
}

/// One client's SSE session.
pub struct SseTransport {
    session_id: String,
    endpoint: String,
    inner: Mutex<Inner>,
}

impl SseTransport {
    /// Create a transport whose clients must POST to `endpoint`.
    ///
    /// The returned stream feeds the response body. Dropping it closes the transport.
    pub fn new(endpoint: impl Into<String>) -> (Arc<Self>, SseStream) {
        let (sink, events) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            session_id: Uuid::new_v4().to_string(),
            endpoint: endpoint.into(),
            inner: Mutex::new(Inner {
                state: SessionState::Created,
                sink: Some(sink),
                on_message: None,
                on_close: None,
                on_error: None,
            }),
        });

        let stream = SseStream {
            events: UnboundedReceiverStream::new(events),
            transport: Arc::clone(&transport),
        };

        (transport, stream)
    }

    /// The session identifier clients must pass as `sessionId`.
    pub fn id(&self) -> &str {
        &self.session_id
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().state == SessionState::Connected
    }

    /// The URL announced in the `endpoint` frame.
    pub fn endpoint_url(&self) -> String {
        let path = self
            .endpoint
            .split('/')
            .map(urlencoding::encode)
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}?sessionId={}",
            path,
            urlencoding::encode(&self.session_id)
        )
    }

    /// Handle one POSTed client message.
    ///
    /// Returns as soon as the message handler has been invoked; any reply
    /// comes back later through [`Transport::send`].
    pub fn receive(&self, body: &[u8]) -> Acknowledgement {
        if !self.is_connected() {
            warn!(session_id = %self.session_id, "Message received for a session that is not connected");
            return Acknowledgement::NotConnected;
        }

        let message = match JsonRpcMessage::from_slice(body) {
            Ok(message) => message,
            Err(e) => {
                warn!(session_id = %self.session_id, "Rejecting invalid message: {}", e);
                let reason = e.to_string();
                self.report(&TransportError::InvalidMessage(e));
                return Acknowledgement::Rejected(reason);
            }
        };

        let handler = self.inner.lock().on_message.clone();
        match handler {
            Some(handler) => handler(message),
            None => debug!(session_id = %self.session_id, "No message handler installed, dropping message"),
        }

        Acknowledgement::Accepted
    }

    /// Transition to closed. Returns false if already closed.
    fn close_now(&self) -> bool {
        let (on_close, on_message) = {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Closed {
                return false;
            }
            inner.state = SessionState::Closed;
            // Dropping the sender ends the response body.
            inner.sink = None;
            (inner.on_close.take(), inner.on_message.take())
        };
        drop(on_message);

        info!(session_id = %self.session_id, "SSE session closed");
        if let Some(handler) = on_close {
            handler();
        }
        true
    }

    /// Queue one event. The caller must hold the lock on `inner`.
    fn enqueue(inner: &Inner, event: &str, data: &str) -> Result<()> {
        if inner.state != SessionState::Connected {
            return Err(TransportError::NotConnected);
        }
        let event = Event::default().event(event).data(data);
        match &inner.sink {
            Some(sink) if sink.send(event).is_ok() => Ok(()),
            _ => Err(TransportError::StreamClosed),
        }
    }

    fn report(&self, error: &TransportError) {
        let handler = self.inner.lock().on_error.clone();
        if let Some(handler) = handler {
            handler(error);
        }
    }

    /// A write to the queue failed: report it and close the session.
    fn fail(&self, error: &TransportError) {
        error!(session_id = %self.session_id, "Error writing to event stream: {}", error);
        self.report(error);
        self.close_now();
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn start(&self) -> Result<()> {
        let url = self.endpoint_url();
        let result = {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Connected => return Ok(()),
                SessionState::Closed => return Err(TransportError::NotConnected),
                SessionState::Created => {}
            }
            inner.state = SessionState::Connected;
            // The endpoint frame is queued under the same lock so no message
            // frame can overtake it.
            Self::enqueue(&inner, ENDPOINT_EVENT, &url)
        };

        match result {
            Ok(()) => {
                info!(session_id = %self.session_id, "SSE session started");
                Ok(())
            }
            Err(e) => {
                error!(session_id = %self.session_id, "Error starting transport: {}", e);
                self.fail(&e);
                Err(e)
            }
        }
    }

    async fn send(&self, message: &JsonRpcMessage) -> Result<()> {
        let data = serde_json::to_string(message)?;
        let result = Self::enqueue(&self.inner.lock(), MESSAGE_EVENT, &data);
        match result {
            Err(TransportError::StreamClosed) => {
                let e = TransportError::StreamClosed;
                self.fail(&e);
                Err(e)
            }
            other => other,
        }
    }

    async fn close(&self) -> Result<()> {
        self.close_now();
        Ok(())
    }

    fn session_id(&self) -> Option<&str> {
        Some(&self.session_id)
    }

    /// Closing drops the installed message handler.
    fn set_message_handler(&self, handler: MessageHandler) {
        self.inner.lock().on_message = Some(handler);
    }

    /// A handler installed after the transport closed is never called.
    fn set_close_handler(&self, handler: CloseHandler) {
        self.inner.lock().on_close = Some(handler);
    }

    fn set_error_handler(&self, handler: ErrorHandler) {
        self.inner.lock().on_error = Some(handler);
    }
}

impl fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseTransport")
            .field("session_id", &self.session_id)
            .field("endpoint", &self.endpoint)
            .field("state", &self.inner.lock().state)
            .finish()
    }
}

/// Event stream of an SSE session, to be wrapped in `Sse`.
///
/// Dropping the stream, which happens when the client disconnects, closes
/// the transport.
pub struct SseStream {
    events: UnboundedReceiverStream<Event>,
    transport: Arc<SseTransport>,
}

impl Stream for SseStream {
    type Item = std::result::Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx).map(|event| event.map(Ok))
    }
}

impl Drop for SseStream {
    fn drop(&mut self) {
        if self.transport.close_now() {
            debug!(session_id = %self.transport.session_id, "SSE client disconnected");
        }
    }
}

/// Outcome of [`SseTransport::receive`], rendered as the POST response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgement {
    /// Handed to the message handler.
    Accepted,
    /// The body is not a JSON-RPC message.
    Rejected(String),
    /// The session exists but its stream is not open.
    NotConnected,
}

impl Acknowledgement {
    pub fn status(&self) -> StatusCode {
        match self {
            Acknowledgement::Accepted => StatusCode::ACCEPTED,
            Acknowledgement::Rejected(_) => StatusCode::BAD_REQUEST,
            Acknowledgement::NotConnected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Acknowledgement {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Acknowledgement::Accepted => json!({ "success": true }),
            Acknowledgement::Rejected(reason) => json!({ "error": reason }),
            Acknowledgement::NotConnected => json!({ "error": "SSE connection not established" }),
        };
        (status, Json(body)).into_response()
    }
}
