use std::env;
use std::path::PathBuf;
use std::time::Duration;

use qlrgen_raster::ExtractorConfig;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_TEMPLATE_CONFIG: &str = "templates/template_config.toml";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    InvalidValue {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// API server configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub port: u16,
    pub template_config: PathBuf,
    /// Single allowed origin; CORS is off when unset
    pub cors_origin: Option<String>,
    pub http_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            template_config: PathBuf::from(DEFAULT_TEMPLATE_CONFIG),
            cors_origin: None,
            http_timeout: None,
            connect_timeout: None,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match var("QLRGEN_PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                name: "QLRGEN_PORT",
                value,
                expected: "a port number",
            })?,
            None => defaults.port,
        };

        Ok(Self {
            port,
            template_config: var("QLRGEN_TEMPLATE_CONFIG")
                .map(PathBuf::from)
                .unwrap_or(defaults.template_config),
            cors_origin: var("QLRGEN_CORS_ORIGIN"),
            http_timeout: seconds("QLRGEN_HTTP_TIMEOUT_SECS", var("QLRGEN_HTTP_TIMEOUT_SECS"))?,
            connect_timeout: seconds(
                "QLRGEN_CONNECT_TIMEOUT_SECS",
                var("QLRGEN_CONNECT_TIMEOUT_SECS"),
            )?,
        })
    }

    /// Get the server bind address
    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    /// Extractor settings with any configured timeouts applied.
    ///
    /// The service only fetches http(s) sources; a request must never make
    /// it read files from the server's own disk.
    pub fn extractor_config(&self) -> ExtractorConfig {
        let mut config = ExtractorConfig {
            allow_local_paths: false,
            ..ExtractorConfig::default()
        };
        if let Some(timeout) = self.http_timeout {
            config = config.with_timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            config.connect_timeout = timeout;
        }
        config
    }
}

fn seconds(name: &'static str, value: Option<String>) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => Err(ConfigError::InvalidValue {
            name,
            value,
            expected: "a positive number of seconds",
        }),
    }
}
