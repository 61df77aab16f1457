//! MCP (Model Context Protocol) protocol core.
//!
//! - [`jsonrpc`] - JSON-RPC 2.0 message model and validation
//! - [`handler`] - the dispatcher answering MCP methods
//! - [`tools`] - the Mercury tool catalogue

pub mod handler;
pub mod jsonrpc;
pub mod tools;

pub use handler::McpServer;
pub use jsonrpc::{JsonRpcMessage, ProtocolError, RequestId};
