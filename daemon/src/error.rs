//! Error types for the Nudge daemon.
//!
//! Each module defines its own error enum; [`NudgeError`] gathers them for
//! callers that want a single type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::scheduler::NotifyError;
use crate::session::SessionError;
use crate::source::SourceError;
use crate::store::StoreError;

/// Errors that can occur during daemon operations.
///
/// # Examples
///
/// ```
/// use nudge_daemon::error::{NudgeError, Result};
/// use nudge_daemon::store::StoreError;
///
/// fn load() -> Result<()> {
///     Err(StoreError::Unavailable("locked".to_string()))?
/// }
///
/// assert!(matches!(load(), Err(NudgeError::Store(_))));
/// ```
#[derive(Error, Debug)]
pub enum NudgeError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persistent store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Remote reminder source error.
    #[error("reminder source error: {0}")]
    Source(#[from] SourceError),

    /// Notification scheduling error.
    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Token capture or refresh error.
    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

/// A specialized `Result` type for daemon operations.
pub type Result<T> = std::result::Result<T, NudgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_missing_env_var_display() {
        let err = ConfigError::MissingEnvVar("NUDGE_API_URL".to_string());
        assert_eq!(
            err.to_string(),
            "missing required environment variable: NUDGE_API_URL"
        );
    }

    #[test]
    fn config_error_invalid_value_display() {
        let err = ConfigError::InvalidValue {
            key: "NUDGE_TICK_INTERVAL_MS".to_string(),
            message: "expected positive integer".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for NUDGE_TICK_INTERVAL_MS: expected positive integer"
        );
    }

    #[test]
    fn nudge_error_config_display() {
        let err = NudgeError::Config(ConfigError::MissingEnvVar("NUDGE_API_URL".to_string()));
        assert_eq!(
            err.to_string(),
            "configuration error: missing required environment variable: NUDGE_API_URL"
        );
    }

    #[test]
    fn nudge_error_store_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: NudgeError = StoreError::from(io_err).into();
        assert!(matches!(err, NudgeError::Store(StoreError::Io(_))));
        assert_eq!(err.to_string(), "store error: I/O error: read-only");
    }

    #[test]
    fn nudge_error_notify_display() {
        let err: NudgeError = NotifyError::PermissionNotGranted.into();
        assert_eq!(
            err.to_string(),
            "notification error: notification permission not granted"
        );
    }

    #[test]
    fn nudge_error_session_display() {
        let err: NudgeError = SessionError::NoToken.into();
        assert_eq!(
            err.to_string(),
            "session error: no token stored; capture one first"
        );
    }

    #[test]
    fn error_source_chain() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: NudgeError = StoreError::from(io_err).into();

        assert!(err.source().is_some());
    }
}
