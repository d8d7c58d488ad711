//! Server configuration: TOML file + CLI overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use wssh_core::{WsshError, WsshResult};

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,
    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,
    #[serde(default = "default_rows")]
    pub default_rows: u16,
    #[serde(default = "default_cols")]
    pub default_cols: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
            session_timeout_secs: default_session_timeout(),
            flush_interval_ms: default_flush_interval(),
            default_rows: default_rows(),
            default_cols: default_cols(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5322
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_session_timeout() -> u64 {
    3600
}
fn default_flush_interval() -> u64 {
    20
}
fn default_rows() -> u16 {
    24
}
fn default_cols() -> u16 {
    80
}

/// Resolved server configuration (CLI overrides applied).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub session_timeout: Duration,
    pub flush_interval: Duration,
    pub default_rows: u16,
    pub default_cols: u16,
}

impl ServerConfig {
    /// Load config from TOML file, then apply CLI overrides.
    pub fn load(
        config_path: Option<&Path>,
        cli_bind: Option<&str>,
        cli_port: Option<u16>,
        cli_connect_timeout: Option<u64>,
        cli_session_timeout: Option<u64>,
        cli_flush_interval: Option<u64>,
    ) -> WsshResult<Self> {
        let file_config = if let Some(path) = config_path {
            let expanded = expand_tilde(path);
            if expanded.exists() {
                info!(path = %expanded.display(), "loading config file");
                let content = std::fs::read_to_string(&expanded)?;
                toml::from_str::<ConfigFile>(&content)
                    .map_err(|e| WsshError::Other(format!("config parse error: {e}")))?
            } else {
                info!(path = %expanded.display(), "config file not found, using defaults");
                ConfigFile::default()
            }
        } else {
            ConfigFile::default()
        };

        let server = file_config.server;
        let connect_timeout =
            cli_connect_timeout.unwrap_or(server.connect_timeout_secs);
        let session_timeout =
            cli_session_timeout.unwrap_or(server.session_timeout_secs);
        let flush_interval = cli_flush_interval.unwrap_or(server.flush_interval_ms);
        // tokio::time::interval panics on a zero period; floor at 1ms.
        if flush_interval == 0 {
            warn!("flush interval of 0ms raised to 1ms");
        }
        let flush_interval = flush_interval.max(1);

        Ok(Self {
            bind: cli_bind.map(str::to_string).unwrap_or(server.bind),
            port: cli_port.unwrap_or(server.port),
            connect_timeout: Duration::from_secs(connect_timeout),
            session_timeout: Duration::from_secs(session_timeout),
            flush_interval: Duration::from_millis(flush_interval),
            default_rows: server.default_rows,
            default_cols: server.default_cols,
        })
    }
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(s.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let cfg = ServerConfig::load(None, None, None, None, None, None).unwrap();
        assert_eq!(cfg.port, 5322);
        assert_eq!(cfg.connect_timeout, Duration::from_secs(5));
        assert_eq!(cfg.flush_interval, Duration::from_millis(20));
        assert_eq!((cfg.default_rows, cfg.default_cols), (24, 80));
    }

    #[test]
    fn cli_overrides_win() {
        let cfg =
            ServerConfig::load(None, Some("127.0.0.1"), Some(9000), Some(2), Some(60), Some(50))
                .unwrap();
        assert_eq!(cfg.bind, "127.0.0.1");
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.connect_timeout, Duration::from_secs(2));
        assert_eq!(cfg.session_timeout, Duration::from_secs(60));
        assert_eq!(cfg.flush_interval, Duration::from_millis(50));
    }

    #[test]
    fn zero_flush_interval_is_raised_to_one_ms() {
        // File values share the same merge path as the CLI override.
        let cfg = ServerConfig::load(None, None, None, None, None, Some(0)).unwrap();
        assert_eq!(cfg.flush_interval, Duration::from_millis(1));
    }

    #[test]
    fn parses_server_section() {
        let file: ConfigFile = toml::from_str(
            r#"
            [server]
            port = 4000
            session_timeout_secs = 120
            "#,
        )
        .unwrap();
        assert_eq!(file.server.port, 4000);
        assert_eq!(file.server.session_timeout_secs, 120);
        // Unset keys fall back to defaults.
        assert_eq!(file.server.flush_interval_ms, 20);
    }
}
