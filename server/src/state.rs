//! Application state management.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::BankingApi;
use crate::config::Config;
use crate::mcp::McpServer;
use crate::transport::SessionRegistry;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Protocol core shared by every session
    server: Arc<McpServer>,
    /// Open SSE sessions
    sessions: SessionRegistry,
    /// Route announced in each session's endpoint frame
    message_path: String,
    /// Idle period before an SSE keep-alive comment
    keep_alive: Option<Duration>,
    /// Cancelled once shutdown begins
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(server: Arc<McpServer>, config: &Config) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                server,
                sessions: SessionRegistry::new(),
                message_path: config.message_path.clone(),
                keep_alive: config.keep_alive,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Create state around a banking backend.
    pub fn with_api(api: Arc<dyn BankingApi>, config: &Config) -> Self {
        Self::new(Arc::new(McpServer::new(api)), config)
    }

    pub fn server(&self) -> &Arc<McpServer> {
        &self.inner.server
    }

    /// Get the session registry.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    pub fn message_path(&self) -> &str {
        &self.inner.message_path
    }

    pub fn keep_alive(&self) -> Option<Duration> {
        self.inner.keep_alive
    }

    /// Whether new sessions are being refused.
    pub fn is_draining(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Stop accepting sessions and close every open one.
    ///
    /// Returns the number of sessions closed. Safe to call more than once.
    pub async fn drain(&self) -> usize {
        self.inner.shutdown.cancel();
        info!(
            "Draining {} open SSE session(s)",
            self.inner.sessions.len()
        );
        self.inner.sessions.close_all().await
    }
}
