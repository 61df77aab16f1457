//! Mercury MCP server.

use anyhow::Context;
use clap::{builder::FalseyValueParser, ArgAction, Parser};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use mercury_mcp::{
    auth::AuthConfig,
    client::{BankingApi, MercuryClient},
    config::{Config, ConfigOverrides, TransportMode},
    create_app, logging,
    mcp::McpServer,
    shutdown,
    state::AppState,
    transport::{StdioTransport, Transport},
};

/// Mercury MCP - banking accounts and transactions over the Model Context Protocol
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on in HTTP mode
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind to in HTTP mode
    #[arg(long)]
    host: Option<String>,

    /// Which binding to run
    #[arg(long, value_enum, default_value = "auto")]
    transport: TransportMode,

    /// Use HTTP even when stdin is not a terminal
    #[arg(long, env = "FORCE_HTTP", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    force_http: bool,

    /// Extra config file merged above the discovered ones
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Time given to in-flight tasks once the server has stopped.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_figment(&ConfigOverrides {
        host: args.host.clone(),
        port: args.port,
        config_file: args.config.clone(),
    })?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = logging::init(config.log_level.as_deref(), config.log_file.as_deref())?;

    let mode = args
        .transport
        .resolve(args.force_http, std::io::stdin().is_terminal());
    info!("Starting Mercury MCP server ({:?} mode)", mode);
    info!("Configuration loaded: {:?}", config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let result = runtime.block_on(async {
        match mode {
            TransportMode::Stdio => run_stdio(&config).await,
            _ => run_http(&config).await,
        }
    });

    // Stdin reads run on a blocking thread that never returns on its own.
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

fn banking_api(config: &Config) -> Arc<dyn BankingApi> {
    let api_key = config.mercury_api_key.clone().unwrap_or_else(|| {
        warn!("MERCURY_API_KEY is not set - Mercury API calls will fail");
        String::new()
    });
    Arc::new(MercuryClient::new(&config.mercury_base_url, api_key))
}

async fn run_stdio(config: &Config) -> anyhow::Result<()> {
    let server = Arc::new(McpServer::new(banking_api(config)));
    let transport: Arc<dyn Transport> = Arc::new(StdioTransport::stdio());

    let dispatch = server
        .connect(transport.clone())
        .await
        .context("Failed to start stdio transport")?;
    info!("Serving MCP over stdio");

    tokio::select! {
        result = dispatch => {
            if let Err(e) = result {
                error!("Stdio dispatch task failed: {}", e);
            }
            info!("Stdin closed, exiting");
        }
        _ = shutdown::shutdown_signal() => {
            if let Err(e) = transport.close().await {
                error!("Failed to close stdio transport: {}", e);
            }
        }
    }

    Ok(())
}

async fn run_http(config: &Config) -> anyhow::Result<()> {
    let auth_config = AuthConfig::new(config.mcp_api_key.clone());
    let state = AppState::with_api(banking_api(config), config);
    let app = create_app(state.clone(), config, auth_config);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", addr);
    info!(
        "SSE stream at {}, messages at {}, stateless endpoint at {}",
        config.stream_path, config.message_path, config.mcp_path
    );

    shutdown::serve(listener, app, state, shutdown::shutdown_signal()).await?;

    info!("Server stopped");
    Ok(())
}
