//! Configuration management for hoardd
//!
//! This module handles loading, parsing, and managing configuration from:
//! - Configuration files (TOML format)
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::query::LookupMode;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection configuration
    pub connection: ConnectionConfig,

    /// Lookup parameters
    pub lookup: LookupConfig,

    /// Export pipeline configuration
    pub export: ExportConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Backend connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Elasticsearch endpoint URL
    #[serde(default)]
    pub url: String,

    /// Index name or pattern, e.g. `leak_*`
    #[serde(default = "default_index")]
    pub index: String,

    /// Basic auth username
    #[serde(default)]
    pub username: String,

    /// Basic auth password
    #[serde(default)]
    pub password: String,

    /// Number of connection attempts before giving up
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay between connection attempts in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Lookup parameters; exactly one must be set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Exact email address
    #[serde(default)]
    pub email: Option<String>,

    /// Email domain
    #[serde(default)]
    pub domain: Option<String>,

    /// Exact password
    #[serde(default)]
    pub pass: Option<String>,

    /// Raw query clause as JSON
    #[serde(default)]
    pub raw: Option<String>,
}

/// Export pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// CSV output path (generated from a timestamp when unset)
    #[serde(default)]
    pub outfile: Option<PathBuf>,

    /// JSON Lines dump path for the full documents
    #[serde(default)]
    pub dumpfile: Option<PathBuf>,

    /// Maximum number of records to write, 0 for no limit
    #[serde(default)]
    pub limit: u64,

    /// Number of concurrent transform/write workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Documents requested per scroll page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Scroll keep-alive, in Elasticsearch time units
    #[serde(default = "default_keep_alive")]
    pub keep_alive: String,

    /// Flush output buffers every N lines
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,

    /// Append to an existing CSV file instead of truncating it
    #[serde(default)]
    pub append: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_index() -> String {
    "leak_*".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    30
}

fn default_timeout() -> u64 {
    120
}

fn default_workers() -> usize {
    10
}

fn default_page_size() -> usize {
    1000
}

fn default_keep_alive() -> String {
    "2m".to_string()
}

fn default_flush_every() -> usize {
    1000
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            index: default_index(),
            username: String::new(),
            password: String::new(),
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            outfile: None,
            dumpfile: None,
            limit: 0,
            workers: default_workers(),
            page_size: default_page_size(),
            keep_alive: default_keep_alive(),
            flush_every: default_flush_every(),
            append: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.display().to_string())
            } else {
                ConfigError::InvalidFormat(format!("{}: {}", path.display(), e))
            }
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Load configuration from an explicit path, or from the default path if it exists
    ///
    /// An explicit path that does not exist is an error; a missing default file is not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".hoardd")
            .join("config.toml")
    }

    /// Validate the configuration
    ///
    /// Checks that every required connection parameter is present and that
    /// the pipeline tunables are usable.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("url", &self.connection.url),
            ("index", &self.connection.index),
            ("username", &self.connection.username),
            ("password", &self.connection.password),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(field.to_string()).into());
            }
        }

        self.connection.validate_url()?;

        if self.export.workers == 0 {
            return Err(invalid("workers", "0"));
        }
        if self.export.page_size == 0 {
            return Err(invalid("page_size", "0"));
        }
        if self.export.flush_every == 0 {
            return Err(invalid("flush_every", "0"));
        }
        if self.export.keep_alive.trim().is_empty() {
            return Err(invalid("keep_alive", ""));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: &str) -> crate::error::HoarddError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

impl ConnectionConfig {
    /// Parse and validate the endpoint URL
    pub fn validate_url(&self) -> Result<()> {
        match url::Url::parse(&self.url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => Ok(()),
            _ => Err(crate::error::ConnectionError::InvalidUrl(self.url.clone()).into()),
        }
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get delay between connection attempts as Duration
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl LookupConfig {
    /// Resolve the single lookup mode
    ///
    /// Empty values count as unset.
    pub fn mode(&self) -> Result<LookupMode> {
        let candidates = [
            ("email", &self.email, LookupMode::Email as fn(String) -> LookupMode),
            ("domain", &self.domain, LookupMode::Domain),
            ("pass", &self.pass, LookupMode::Password),
            ("raw", &self.raw, LookupMode::Raw),
        ];

        let set: Vec<_> = candidates
            .into_iter()
            .filter_map(|(name, value, make)| match value.as_deref() {
                Some(v) if !v.is_empty() => Some((name, v, make)),
                _ => None,
            })
            .collect();

        match set.as_slice() {
            [] => Err(ConfigError::MissingLookup.into()),
            [(_, value, make)] => Ok(make(value.to_string())),
            _ => Err(ConfigError::ConflictingLookups(set.iter().map(|(n, _, _)| *n).collect()).into()),
        }
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
