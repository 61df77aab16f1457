//! MCP request dispatcher.
//!
//! [`McpServer`] answers the MCP methods it supports and runs the Mercury
//! tools. Bindings either call [`McpServer::handle_message`] directly or hand
//! a transport to [`McpServer::connect`].

use mercury_types::{ListAccountTransactionsResponse, ListAccountsResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::jsonrpc::{codes, JsonRpcMessage, JsonRpcRequest, RequestId};
use super::tools::{self, ToolCall};
use crate::client::BankingApi;
use crate::transport::{Transport, TransportError};

/// MCP protocol version we support.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Name announced in `serverInfo`.
pub const SERVER_NAME: &str = "mercury-mcp-server";

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

/// Upstream data returned by a tool.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ToolOutput {
    Accounts(ListAccountsResponse),
    Transactions(ListAccountTransactionsResponse),
}

/// The MCP protocol core.
pub struct McpServer {
    api: Arc<dyn BankingApi>,
}

impl McpServer {
    pub fn new(api: Arc<dyn BankingApi>) -> Self {
        Self { api }
    }

    /// Handle one inbound message. Returns the reply, if the message has one.
    pub async fn handle_message(&self, message: JsonRpcMessage) -> Option<JsonRpcMessage> {
        match message {
            JsonRpcMessage::Request(request) => Some(self.handle_request(request).await),
            JsonRpcMessage::Notification(notification) => {
                debug!("MCP: Notification {}", notification.method);
                None
            }
            JsonRpcMessage::Response(response) => {
                debug!("MCP: Ignoring response to request {}", response.id);
                None
            }
            JsonRpcMessage::Error(e) => {
                warn!(
                    "MCP: Client reported error {}: {}",
                    e.error.code, e.error.message
                );
                None
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcMessage {
        let id = request.id;
        debug!("MCP: Handling method: {}", request.method);

        match request.method.as_str() {
            "initialize" => JsonRpcMessage::success(id, Self::initialize_result()),
            "ping" => JsonRpcMessage::success(id, json!({})),
            "tools/list" => JsonRpcMessage::success(id, json!({ "tools": tools::definitions() })),
            "tools/call" => self.handle_call_tool(id, request.params).await,
            other => JsonRpcMessage::error(
                Some(id),
                codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        }
    }

    fn initialize_result() -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    async fn handle_call_tool(&self, id: RequestId, params: Option<Value>) -> JsonRpcMessage {
        let params: ToolCallParams =
            match serde_json::from_value(params.unwrap_or_else(|| json!({}))) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcMessage::error(
                        Some(id),
                        codes::INVALID_PARAMS,
                        format!("Invalid tools/call params: {}", e),
                    )
                }
            };

        let call = match ToolCall::parse(&params.name, params.arguments.unwrap_or(Value::Null)) {
            Ok(call) => call,
            Err(e) => {
                warn!("MCP: Rejected tool call: {}", e);
                return JsonRpcMessage::error(Some(id), codes::INVALID_PARAMS, e.to_string());
            }
        };

        let name = call.name();
        match self.call_tool(call).await {
            Ok(output) => match tools::success_result(&output) {
                Ok(result) => JsonRpcMessage::success(id, result),
                Err(e) => {
                    error!("MCP: Failed to encode {} result: {}", name, e);
                    JsonRpcMessage::error(
                        Some(id),
                        codes::INTERNAL_ERROR,
                        format!("Failed to encode tool result: {}", e),
                    )
                }
            },
            Err(e) => {
                error!("MCP: Tool {} failed: {:#}", name, e);
                JsonRpcMessage::success(id, tools::error_result(format!("{:#}", e)))
            }
        }
    }

    async fn call_tool(&self, call: ToolCall) -> anyhow::Result<ToolOutput> {
        match call {
            ToolCall::ListAccounts(args) => {
                info!(
                    "MCP: Listing accounts (include archived: {})",
                    args.include_archived
                );
                let mut accounts = self.api.list_accounts().await?;
                if !args.include_archived {
                    accounts = accounts.without_archived();
                }
                Ok(ToolOutput::Accounts(accounts))
            }
            ToolCall::GetAccountTransactions(args) => {
                match args.status {
                    Some(status) => info!(
                        "MCP: Listing {} transactions for account {}",
                        status, args.account_id
                    ),
                    None => info!("MCP: Listing transactions for account {}", args.account_id),
                }
                let transactions = self
                    .api
                    .list_account_transactions(args.account_id, &args.query())
                    .await?;
                Ok(ToolOutput::Transactions(transactions))
            }
        }
    }

    /// Attach a transport and serve it until it closes.
    ///
    /// Every inbound message is handled on its own task and any reply is
    /// pushed back with [`Transport::send`]. The returned task finishes once
    /// the transport has closed.
    pub async fn connect(
        self: &Arc<Self>,
        transport: Arc<dyn Transport>,
    ) -> Result<JoinHandle<()>, TransportError> {
        let session_id = transport.session_id().unwrap_or("stdio").to_string();

        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.set_message_handler(Arc::new(move |message| {
            // Fails only once the dispatch loop is gone.
            let _ = tx.send(message);
        }));
        let error_session = session_id.clone();
        transport.set_error_handler(Arc::new(move |e| {
            warn!(session_id = %error_session, "Transport error: {}", e);
        }));

        transport.start().await?;

        let server = Arc::clone(self);
        Ok(tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let server = server.clone();
                let transport = transport.clone();
                let session_id = session_id.clone();
                tokio::spawn(async move {
                    if let Some(reply) = server.handle_message(message).await {
                        if let Err(e) = transport.send(&reply).await {
                            warn!(session_id = %session_id, "Failed to send reply: {}", e);
                        }
                    }
                });
            }
            debug!(session_id = %session_id, "MCP dispatch loop finished");
        }))
    }
}
