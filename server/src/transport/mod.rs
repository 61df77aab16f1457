//! Transports carrying JSON-RPC messages between a client and the MCP core.
//!
//! A transport owns one client channel. The core installs a message handler,
//! calls [`Transport::start`], and pushes replies with [`Transport::send`].
//! Each transport holds at most one handler per event kind.
//!
//! - [`sse::SseTransport`] - one per SSE connection, fed by HTTP POSTs
//! - [`stdio::StdioTransport`] - newline-delimited JSON over a byte stream pair

use async_trait::async_trait;
use std::sync::Arc;

use crate::mcp::jsonrpc::{JsonRpcMessage, ProtocolError};

pub mod registry;
pub mod sse;
pub mod stdio;

pub use registry::SessionRegistry;
pub use sse::{Acknowledgement, SseStream, SseTransport};
pub use stdio::StdioTransport;

/// Called for every validated inbound message.
pub type MessageHandler = Arc<dyn Fn(JsonRpcMessage) + Send + Sync>;
/// Called once when the transport transitions to closed.
pub type CloseHandler = Arc<dyn Fn() + Send + Sync>;
/// Called when the transport hits an error it cannot hand back to a caller.
pub type ErrorHandler = Arc<dyn Fn(&TransportError) + Send + Sync>;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Not connected")]
    NotConnected,

    #[error("Event stream closed by the client")]
    StreamClosed,

    #[error("Invalid message: {0}")]
    InvalidMessage(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// A bidirectional JSON-RPC channel to one client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin delivering messages. Calling it on a started transport is a no-op.
    async fn start(&self) -> Result<()>;

    /// Deliver one outbound message to the client.
    async fn send(&self, message: &JsonRpcMessage) -> Result<()>;

    /// Close the channel. Idempotent.
    async fn close(&self) -> Result<()>;

    /// Session identifier, for transports that have one.
    fn session_id(&self) -> Option<&str> {
        None
    }

    fn set_message_handler(&self, handler: MessageHandler);

    fn set_close_handler(&self, handler: CloseHandler);

    fn set_error_handler(&self, handler: ErrorHandler);
}
