//! Configuration module for the Nudge daemon.
//!
//! This module handles parsing configuration from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `NUDGE_API_URL` | Yes | - | Reminders endpoint (e.g., `https://app.example.com/api/reminders`) |
//! | `NUDGE_DATA_DIR` | No | `~/.nudge` | Directory holding the persisted token and reminders |
//! | `NUDGE_TICK_INTERVAL_MS` | No | 1000 | Milliseconds between due-time checks |
//! | `NUDGE_DUE_WINDOW_MS` | No | 60000 | Width of the due window on either side of a reminder |
//! | `NUDGE_REQUEST_TIMEOUT_SECS` | No | 30 | HTTP request timeout for reminder fetches |
//!
//! # Example
//!
//! ```no_run
//! use nudge_daemon::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Reminders endpoint: {}", config.api_url);
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use directories::BaseDirs;
use thiserror::Error;

/// Default data directory name relative to home.
const DEFAULT_DATA_DIR: &str = ".nudge";

/// Default interval between notifier ticks, in milliseconds.
const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Default due window, in milliseconds.
const DEFAULT_DUE_WINDOW_MS: u64 = 60_000;

/// Default HTTP request timeout, in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,
}

/// Configuration for the Nudge daemon.
#[derive(Debug, Clone)]
pub struct Config {
    /// Full URL of the reminders endpoint.
    pub api_url: String,

    /// Directory holding the persisted key-value entries.
    pub data_dir: PathBuf,

    /// Interval between due-time checks.
    pub tick_interval: Duration,

    /// Due window in milliseconds.
    pub due_window_ms: i64,

    /// Timeout applied to each reminder fetch.
    pub request_timeout: Duration,
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - `NUDGE_API_URL` is not set or is blank
    /// - any numeric variable is set but is not a positive integer
    /// - `NUDGE_DATA_DIR` is unset and the home directory cannot be determined
    pub fn from_env() -> Result<Self, ConfigError> {
        // Required: NUDGE_API_URL
        let api_url = env::var("NUDGE_API_URL")
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("NUDGE_API_URL".to_string()))?;

        // Optional: NUDGE_DATA_DIR (default: ~/.nudge)
        let data_dir = match env::var("NUDGE_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => {
                let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
                base_dirs.home_dir().join(DEFAULT_DATA_DIR)
            }
        };

        let tick_interval_ms = parse_positive("NUDGE_TICK_INTERVAL_MS", DEFAULT_TICK_INTERVAL_MS)?;
        let due_window_ms = parse_positive("NUDGE_DUE_WINDOW_MS", DEFAULT_DUE_WINDOW_MS)?;
        let request_timeout_secs =
            parse_positive("NUDGE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;

        let due_window_ms = i64::try_from(due_window_ms).map_err(|_| ConfigError::InvalidValue {
            key: "NUDGE_DUE_WINDOW_MS".to_string(),
            message: format!("due window too large: {due_window_ms}"),
        })?;

        Ok(Self {
            api_url,
            data_dir,
            tick_interval: Duration::from_millis(tick_interval_ms),
            due_window_ms,
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }
}

/// Parses an optional positive integer variable, falling back to `default`.
fn parse_positive(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(val) => {
            let parsed = val
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("expected positive integer, got '{val}'"),
                })?;
            if parsed == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "value must be greater than 0".to_string(),
                });
            }
            Ok(parsed)
        }
        Err(_) => Ok(default),
    }
}
