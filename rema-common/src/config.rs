//! Configuration loading and resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`REMA_SERVICE_URL`, `REMA_PORT`)
//! 3. TOML config file (`~/.config/rema/config.toml` unless overridden)
//! 4. Compiled default (fallback)
//!
//! A missing config file is not an error: REMA logs a warning and starts on defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::export::ExportMode;
use crate::{Error, Result};

/// Classification service base URL used when nothing else is configured
pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:5000";
/// rema-ui listen port used when nothing else is configured
pub const DEFAULT_PORT: u16 = 5780;
/// Per-request timeout for classification-service calls
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_SERVICE_URL: &str = "REMA_SERVICE_URL";
pub const ENV_PORT: &str = "REMA_PORT";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Classification service base URL
    #[serde(default)]
    pub service_url: Option<String>,

    /// HTTP listen port for rema-ui
    #[serde(default)]
    pub port: Option<u16>,

    /// Classification request timeout in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Directory holding the browser bundle (optional)
    #[serde(default)]
    pub static_assets: Option<PathBuf>,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// CSV export defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Default emotion column density when the request does not specify one
    #[serde(default)]
    pub mode: ExportMode,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Platform config file location (`<config dir>/rema/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rema").join("config.toml"))
}

/// Load TOML config; a missing file yields defaults with a warning
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "Config file not found, using defaults"
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Command-line overrides (highest priority)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub service_url: Option<String>,
    pub port: Option<u16>,
    pub static_assets: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Fully resolved runtime settings
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub service_url: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub static_assets: Option<PathBuf>,
    pub export_mode: ExportMode,
    pub log_level: String,
}

impl ResolvedConfig {
    /// Apply CLI → environment → TOML → default priority
    pub fn resolve(cli: &CliOverrides, toml_config: &TomlConfig) -> Result<Self> {
        let service_url = cli
            .service_url
            .clone()
            .or_else(|| non_empty_env(ENV_SERVICE_URL))
            .or_else(|| toml_config.service_url.clone())
            .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string());
        let service_url = validate_service_url(&service_url)?;

        let port = match cli.port {
            Some(port) => port,
            None => match non_empty_env(ENV_PORT) {
                Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                    Error::Config(format!("{} must be a port number, got '{}'", ENV_PORT, raw))
                })?,
                None => toml_config.port.unwrap_or(DEFAULT_PORT),
            },
        };

        let timeout_secs = toml_config
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            service_url,
            port,
            request_timeout: Duration::from_secs(timeout_secs),
            static_assets: cli
                .static_assets
                .clone()
                .or_else(|| toml_config.static_assets.clone()),
            export_mode: toml_config.export.mode,
            log_level: cli
                .log_level
                .clone()
                .unwrap_or_else(|| toml_config.logging.level.clone()),
        })
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Require an http(s) URL; trailing slashes are dropped so paths can be appended
fn validate_service_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(Error::Config(format!(
            "service_url must start with http:// or https://, got '{}'",
            raw
        )));
    }
    Ok(trimmed.to_string())
}
