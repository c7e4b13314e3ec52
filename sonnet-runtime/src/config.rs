//! Runtime Configuration
//!
//! Loaded from environment variables with defaults suitable for a single
//! bot process. Call [`RuntimeConfig::validate`] before building a context.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sonnet_core::ConfigError;
use sonnet_storage::CacheOptions;

pub const DEFAULT_ATTACHMENT_DIR: &str = "datastore/attachments";
pub const DEFAULT_ATTACHMENT_TTL_SECS: u64 = 600;

// ============================================================================
// LOG FORMAT
// ============================================================================

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable `fmt` output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::InvalidValue {
                field: "SONNET_LOG_FORMAT".to_string(),
                value: other.to_string(),
                reason: "expected \"pretty\" or \"json\"".to_string(),
            }),
        }
    }
}

// ============================================================================
// RUNTIME CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Directory that receives encrypted attachment files.
    pub attachment_dir: PathBuf,

    /// How long an attachment stays recoverable after it is stored.
    pub attachment_ttl: Duration,

    /// Bypass the guild config cache and read the store on every event.
    pub stateless: bool,

    pub log_format: LogFormat,

    /// Raw `SONNET_LOG_FORMAT` when it failed to parse; reported by `validate`.
    invalid_log_format: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            attachment_dir: PathBuf::from(DEFAULT_ATTACHMENT_DIR),
            attachment_ttl: Duration::from_secs(DEFAULT_ATTACHMENT_TTL_SECS),
            stateless: false,
            log_format: LogFormat::Pretty,
            invalid_log_format: None,
        }
    }
}

impl RuntimeConfig {
    /// Create RuntimeConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SONNET_ATTACHMENT_DIR`: ciphertext directory (default: datastore/attachments)
    /// - `SONNET_ATTACHMENT_TTL_SECS`: attachment lifetime in seconds (default: 600)
    /// - `SONNET_STATELESS`: "true" or "1" to bypass the config cache (default: false)
    /// - `SONNET_LOG_FORMAT`: "pretty" or "json" (default: pretty)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparseable numbers fall back
    /// to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let attachment_dir = lookup("SONNET_ATTACHMENT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ATTACHMENT_DIR));

        let attachment_ttl = Duration::from_secs(
            lookup("SONNET_ATTACHMENT_TTL_SECS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(DEFAULT_ATTACHMENT_TTL_SECS),
        );

        let stateless = lookup("SONNET_STATELESS")
            .map(|s| matches!(s.trim().to_lowercase().as_str(), "true" | "1"))
            .unwrap_or(false);

        let (log_format, invalid_log_format) = match lookup("SONNET_LOG_FORMAT") {
            Some(raw) => match raw.parse() {
                Ok(format) => (format, None),
                Err(_) => (LogFormat::Pretty, Some(raw)),
            },
            None => (LogFormat::Pretty, None),
        };

        Self {
            attachment_dir,
            attachment_ttl,
            stateless,
            log_format,
            invalid_log_format,
        }
    }

    pub fn with_attachment_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.attachment_dir = dir.into();
        self
    }

    pub fn with_attachment_ttl(mut self, ttl: Duration) -> Self {
        self.attachment_ttl = ttl;
        self
    }

    pub fn with_stateless(mut self, stateless: bool) -> Self {
        self.stateless = stateless;
        self
    }

    /// Options for guild config cache reads.
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions::default().with_stateless(self.stateless)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(raw) = &self.invalid_log_format {
            return Err(ConfigError::InvalidValue {
                field: "SONNET_LOG_FORMAT".to_string(),
                value: raw.clone(),
                reason: "expected \"pretty\" or \"json\"".to_string(),
            });
        }
        if self.attachment_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "SONNET_ATTACHMENT_DIR".to_string(),
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.attachment_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "SONNET_ATTACHMENT_TTL_SECS".to_string(),
                value: "0".to_string(),
                reason: "attachments must live for at least one second".to_string(),
            });
        }
        Ok(())
    }
}
