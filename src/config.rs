//! Service configuration.
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! (or absent) file yields a working setup.  CLI flags are applied on top via
//! [`Config::apply_args`].
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 5000
//! storage_dir = "saved_snapshots"
//!
//! [capture]
//! env_allow_list = ["PATH", "RUST_LOG"]
//! redact_headers = ["authorization", "cookie"]
//! error_tail = 10
//!
//! [debug]
//! recent_window = 20
//! top_n = 5
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cli::Args;

/// Errors raised while loading or validating the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What gets captured into snapshots and request logs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Environment variables copied into `env.environment_variables`.
    pub env_allow_list: Vec<String>,
    /// Header names (case-insensitive) whose values are replaced by
    /// [`REDACTED`] before a request is recorded anywhere.
    pub redact_headers: Vec<String>,
    /// Number of trailing error-log entries copied into each snapshot.
    pub error_tail: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            env_allow_list: [
                "PATH",
                "RUST_LOG",
                "RUST_BACKTRACE",
                "APP_ENV",
                "DATABASE_URL",
                "REDIS_URL",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            redact_headers: [
                "authorization",
                "cookie",
                "set-cookie",
                "proxy-authorization",
                "x-api-key",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            error_tail: 10,
        }
    }
}

/// Sizing for the `/debug/*` introspection endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// How many recent errors / requests `/debug/errors` and `/debug/requests` return.
    pub recent_window: usize,
    /// Length of the "most common" rankings in `/debug/stats`.
    pub top_n: usize,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            recent_window: 20,
            top_n: 5,
        }
    }
}

/// Placeholder written in place of redacted header values.
pub const REDACTED: &str = "[REDACTED]";

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub storage_dir: PathBuf,
    /// Requests with a larger body are rejected with 413.
    pub max_body_bytes: usize,
    /// Base URL embedded in generated test files.  Defaults to
    /// `http://localhost:{port}`.
    pub public_base_url: Option<String>,
    pub capture: CaptureConfig,
    pub debug: DebugConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            storage_dir: PathBuf::from("saved_snapshots"),
            max_body_bytes: 1024 * 1024,
            public_base_url: None,
            capture: CaptureConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load from `path`, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Config::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Config::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = &args.host {
            self.host = host.clone();
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(dir) = &args.storage_dir {
            self.storage_dir = dir.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("max_body_bytes must be >= 1".into()));
        }
        if self.debug.recent_window == 0 {
            return Err(ConfigError::Invalid("debug.recent_window must be >= 1".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }

    /// Whether `name` is on the header redaction list.
    pub fn is_redacted_header(&self, name: &str) -> bool {
        self.capture
            .redact_headers
            .iter()
            .any(|h| h.eq_ignore_ascii_case(name))
    }
}
