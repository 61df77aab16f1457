//! Configuration management.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::client::DEFAULT_BASE_URL;

/// Configuration structure that matches the TOML file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    auth: AuthConfig,
    #[serde(default)]
    mercury: MercuryConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServerConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_stream_path")]
    stream_path: String,
    #[serde(default = "default_message_path")]
    message_path: String,
    #[serde(default = "default_mcp_path")]
    mcp_path: String,
    /// Seconds between SSE keep-alive comments, 0 disables them.
    /// Without them a vanished client of an idle session is only noticed on the next send.
    #[serde(default = "default_keep_alive_secs")]
    keep_alive_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            stream_path: default_stream_path(),
            message_path: default_message_path(),
            mcp_path: default_mcp_path(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct AuthConfig {
    /// Bearer token clients must present
    api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MercuryConfig {
    api_key: Option<String>,
    #[serde(default = "default_base_url")]
    base_url: String,
}

impl Default for MercuryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct LoggingConfig {
    /// Path to log file (if set, logs are written to it in addition to stderr)
    log_file: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error)
    /// If not set, uses RUST_LOG environment variable or defaults to "info"
    level: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    mercury_types::DEFAULT_PORT
}

fn default_stream_path() -> String {
    "/sse".to_string()
}

fn default_message_path() -> String {
    "/messages".to_string()
}

fn default_mcp_path() -> String {
    "/mcp".to_string()
}

fn default_keep_alive_secs() -> u64 {
    15
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Values given on the command line. They take precedence over every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Extra TOML file merged above the discovered config files
    pub config_file: Option<PathBuf>,
}

/// Application configuration.
#[derive(Clone)]
pub struct Config {
    /// Address to bind the HTTP listener to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Route opening an SSE session
    pub stream_path: String,
    /// Route receiving POSTed session messages
    pub message_path: String,
    /// Route for stateless JSON-RPC requests
    pub mcp_path: String,
    /// Idle period after which an SSE comment is sent.
    ///
    /// `None` also disables disconnect detection for idle sessions: a client
    /// that went away stays registered until the next message is sent to it.
    pub keep_alive: Option<Duration>,
    /// Bearer token guarding the MCP routes. `None` rejects every request.
    pub mcp_api_key: Option<String>,
    /// Mercury API credential
    pub mercury_api_key: Option<String>,
    /// Mercury API base URL
    pub mercury_base_url: String,
    /// Path to log file
    pub log_file: Option<PathBuf>,
    /// Log level (if set, used when RUST_LOG is not)
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with full priority chain:
    /// CLI args > plain env vars > `MERCURY_MCP_*` env vars > config files > defaults.
    ///
    /// Config files are merged in this order:
    /// 1. `config.toml` in user config directory (~/.config/mercury-mcp/ on Linux)
    /// 2. `.mercury-mcp.toml` in current directory
    /// 3. the file passed with `--config`
    pub fn from_figment(overrides: &ConfigOverrides) -> anyhow::Result<Self> {
        let local_config = std::env::current_dir()
            .ok()
            .map(|d| d.join(".mercury-mcp.toml"));
        let user_config = directories::ProjectDirs::from("", "", "mercury-mcp")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        let mut figment = Figment::new().merge(Serialized::defaults(ConfigFile {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            mercury: MercuryConfig::default(),
            logging: LoggingConfig::default(),
        }));

        for path in [user_config, local_config].iter().flatten() {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        if let Some(ref path) = overrides.config_file {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }

        // MERCURY_MCP_SERVER__PORT, MERCURY_MCP_AUTH__API_KEY, ...
        figment = figment.merge(Env::prefixed("MERCURY_MCP_").split("__"));

        figment = figment.merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()));
        // Secrets are taken verbatim, never parsed as numbers.
        for (var, key) in [
            ("MCP_API_KEY", "auth.api_key"),
            ("MERCURY_API_KEY", "mercury.api_key"),
        ] {
            if let Some(value) = std::env::var(var).ok().filter(|v| !v.is_empty()) {
                figment = figment.merge(Serialized::default(key, value));
            }
        }

        if let Some(ref host) = overrides.host {
            figment = figment.merge(Serialized::default("server.host", host));
        }
        if let Some(port) = overrides.port {
            figment = figment.merge(Serialized::default("server.port", port));
        }

        let config_file: ConfigFile = figment.extract()?;
        Self::from_file(config_file)
    }

    fn from_file(file: ConfigFile) -> anyhow::Result<Self> {
        for (name, path) in [
            ("stream_path", &file.server.stream_path),
            ("message_path", &file.server.message_path),
            ("mcp_path", &file.server.mcp_path),
        ] {
            validate_route(name, path)?;
        }
        if file.server.message_path == file.server.mcp_path {
            anyhow::bail!(
                "server.message_path and server.mcp_path must differ: both are {:?}",
                file.server.mcp_path
            );
        }

        Ok(Self {
            host: file.server.host,
            port: file.server.port,
            stream_path: file.server.stream_path,
            message_path: file.server.message_path,
            mcp_path: file.server.mcp_path,
            keep_alive: match file.server.keep_alive_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            mcp_api_key: file.auth.api_key.filter(|k| !k.is_empty()),
            mercury_api_key: file.mercury.api_key.filter(|k| !k.is_empty()),
            mercury_base_url: file.mercury.base_url,
            log_file: file.logging.log_file,
            log_level: file.logging.level,
        })
    }

}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            stream_path: default_stream_path(),
            message_path: default_message_path(),
            mcp_path: default_mcp_path(),
            keep_alive: Some(Duration::from_secs(default_keep_alive_secs())),
            mcp_api_key: None,
            mercury_api_key: None,
            mercury_base_url: default_base_url(),
            log_file: None,
            log_level: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret = |value: &Option<String>| value.as_ref().map(|_| "***");
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("stream_path", &self.stream_path)
            .field("message_path", &self.message_path)
            .field("mcp_path", &self.mcp_path)
            .field("keep_alive", &self.keep_alive)
            .field("mcp_api_key", &secret(&self.mcp_api_key))
            .field("mercury_api_key", &secret(&self.mercury_api_key))
            .field("mercury_base_url", &self.mercury_base_url)
            .field("log_file", &self.log_file)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn validate_route(name: &str, path: &str) -> anyhow::Result<()> {
    if !path.starts_with('/') || path.contains('?') {
        anyhow::bail!(
            "server.{} must be an absolute path without a query: {:?}",
            name,
            path
        );
    }
    Ok(())
}

/// Which binding to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TransportMode {
    /// Stdio when stdin is piped, HTTP otherwise
    Auto,
    Stdio,
    Http,
}

impl TransportMode {
    /// Resolve `Auto` against the environment.
    ///
    /// Piped stdin (as with `docker run -i`) selects stdio unless HTTP is forced.
    pub fn resolve(self, force_http: bool, stdin_is_terminal: bool) -> TransportMode {
        match self {
            TransportMode::Auto if force_http || stdin_is_terminal => TransportMode::Http,
            TransportMode::Auto => TransportMode::Stdio,
            explicit => explicit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const VARS: [&str; 6] = [
        "PORT",
        "MCP_API_KEY",
        "MERCURY_API_KEY",
        "MERCURY_MCP_SERVER__PORT",
        "MERCURY_MCP_AUTH__API_KEY",
        "MERCURY_MCP_SERVER__STREAM_PATH",
    ];

    /// Run `f` inside `dir` with the config-related env vars cleared.
    fn in_clean_env<T>(dir: &TempDir, f: impl FnOnce() -> T) -> T {
        let saved: Vec<_> = VARS.iter().map(|v| (*v, std::env::var(v).ok())).collect();
        for var in VARS {
            std::env::remove_var(var);
        }
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();

        let result = f();

        let _ = std::env::set_current_dir(original_dir);
        for (var, value) in saved {
            match value {
                Some(value) => std::env::set_var(var, value),
                None => std::env::remove_var(var),
            }
        }
        result
    }

    #[test]
    #[serial]
    fn test_from_figment_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config =
            in_clean_env(&temp_dir, || Config::from_figment(&ConfigOverrides::default())).unwrap();

        assert_eq!(config.port, mercury_types::DEFAULT_PORT);
        assert_eq!(config.stream_path, "/sse");
        assert_eq!(config.message_path, "/messages");
        assert_eq!(config.mcp_path, "/mcp");
        assert_eq!(config.keep_alive, Some(Duration::from_secs(15)));
        assert!(config.mcp_api_key.is_none());
        assert_eq!(config.mercury_base_url, DEFAULT_BASE_URL);
    }

    #[test]
    #[serial]
    fn test_from_figment_config_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(".mercury-mcp.toml"),
            r#"
[server]
port = 7777
stream_path = "/events"
keep_alive_secs = 0

[auth]
api_key = "from-file"

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config =
            in_clean_env(&temp_dir, || Config::from_figment(&ConfigOverrides::default())).unwrap();

        assert_eq!(config.port, 7777);
        assert_eq!(config.stream_path, "/events");
        assert_eq!(config.keep_alive, None);
        assert_eq!(config.mcp_api_key.as_deref(), Some("from-file"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    #[serial]
    fn test_env_overrides_config_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(".mercury-mcp.toml"),
            "[server]\nport = 7777\n[auth]\napi_key = \"from-file\"",
        )
        .unwrap();

        let config = in_clean_env(&temp_dir, || {
            std::env::set_var("MERCURY_MCP_SERVER__PORT", "8888");
            std::env::set_var("MERCURY_MCP_AUTH__API_KEY", "from-prefixed-env");
            Config::from_figment(&ConfigOverrides::default())
        })
        .unwrap();

        assert_eq!(config.port, 8888);
        assert_eq!(config.mcp_api_key.as_deref(), Some("from-prefixed-env"));
    }

    #[test]
    #[serial]
    fn test_plain_env_vars() {
        let temp_dir = TempDir::new().unwrap();
        let config = in_clean_env(&temp_dir, || {
            std::env::set_var("MERCURY_MCP_SERVER__PORT", "8888");
            std::env::set_var("PORT", "9000");
            std::env::set_var("MCP_API_KEY", "123456");
            std::env::set_var("MERCURY_API_KEY", "secret-token:abc");
            Config::from_figment(&ConfigOverrides::default())
        })
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.mcp_api_key.as_deref(), Some("123456"));
        assert_eq!(config.mercury_api_key.as_deref(), Some("secret-token:abc"));
    }

    #[test]
    #[serial]
    fn test_cli_overrides_everything() {
        let temp_dir = TempDir::new().unwrap();
        let extra = temp_dir.path().join("extra.toml");
        fs::write(temp_dir.path().join(".mercury-mcp.toml"), "[server]\nport = 7777").unwrap();
        fs::write(&extra, "[server]\nhost = \"10.0.0.1\"\nmcp_path = \"/rpc\"").unwrap();

        let config = in_clean_env(&temp_dir, || {
            std::env::set_var("PORT", "8888");
            Config::from_figment(&ConfigOverrides {
                host: Some("127.0.0.1".to_string()),
                port: Some(9999),
                config_file: Some(extra.clone()),
            })
        })
        .unwrap();

        assert_eq!(config.port, 9999);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.mcp_path, "/rpc");
    }

    #[test]
    #[serial]
    fn test_missing_config_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = in_clean_env(&temp_dir, || {
            Config::from_figment(&ConfigOverrides {
                config_file: Some(temp_dir.path().join("missing.toml")),
                ..Default::default()
            })
        });
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_invalid_route_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let result = in_clean_env(&temp_dir, || {
            std::env::set_var("MERCURY_MCP_SERVER__STREAM_PATH", "sse");
            Config::from_figment(&ConfigOverrides::default())
        });
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_shared_post_route_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(".mercury-mcp.toml"),
            "[server]\nmessage_path = \"/rpc\"\nmcp_path = \"/rpc\"",
        )
        .unwrap();

        let result =
            in_clean_env(&temp_dir, || Config::from_figment(&ConfigOverrides::default()));
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = Config {
            mcp_api_key: Some("bearer-secret".to_string()),
            mercury_api_key: Some("upstream-secret".to_string()),
            ..Config::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("bearer-secret"));
        assert!(!debug.contains("upstream-secret"));
    }

    #[test]
    fn test_transport_mode_resolution() {
        assert_eq!(TransportMode::Auto.resolve(false, false), TransportMode::Stdio);
        assert_eq!(TransportMode::Auto.resolve(false, true), TransportMode::Http);
        assert_eq!(TransportMode::Auto.resolve(true, false), TransportMode::Http);
        assert_eq!(TransportMode::Stdio.resolve(true, true), TransportMode::Stdio);
        assert_eq!(TransportMode::Http.resolve(false, false), TransportMode::Http);
    }
}
