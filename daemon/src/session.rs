//! Host-facing session surface.
//!
//! The embedding shell calls [`Session::on_token_captured`] once the page's
//! local storage exposes the token, and [`Session::refresh`] when the user asks
//! for a refresh. Both end in a [`ReminderSynchronizer::sync`].

use std::future::Future;

use thiserror::Error;
use tracing::{info, warn};

use crate::store::StoreError;
use crate::sync::{ReminderSynchronizer, SyncOutcome};

/// Values the page posts when local storage has no token.
const ABSENT_TOKEN_MARKERS: &[&str] = &["null", "undefined"];

/// Errors returned to the host.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The captured value is not a usable token.
    #[error("no usable token in captured value")]
    InvalidToken,

    /// A refresh was requested before any token was captured.
    #[error("no token stored; capture one first")]
    NoToken,

    /// Reading or writing the stored token failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Token capture and refresh entry points.
pub struct Session {
    synchronizer: ReminderSynchronizer,
}

impl Session {
    #[must_use]
    pub fn new(synchronizer: ReminderSynchronizer) -> Self {
        Self { synchronizer }
    }

    /// Returns the stored token, if any.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Store` if the store cannot be read.
    pub fn token(&self) -> Result<Option<String>, SessionError> {
        Ok(self.synchronizer.store().token()?)
    }

    /// Persists a freshly captured token and runs the first sync with it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidToken` for blank or placeholder values
    /// (nothing is stored), or `SessionError::Store` if the token cannot be
    /// persisted. Sync failures are reported through the returned outcome.
    pub async fn on_token_captured(&self, raw: &str) -> Result<SyncOutcome, SessionError> {
        let token = normalize_token(raw).ok_or_else(|| {
            warn!("Captured value is not a usable token");
            SessionError::InvalidToken
        })?;

        self.synchronizer.store().set_token(token)?;
        info!(token_len = token.len(), "Token captured");

        Ok(self.synchronizer.sync(token).await)
    }

    /// Resyncs using the stored token.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoToken` if no token has been captured, or
    /// `SessionError::Store` if it cannot be read.
    pub async fn refresh(&self) -> Result<SyncOutcome, SessionError> {
        let token = self.token()?.ok_or(SessionError::NoToken)?;
        info!("Refreshing reminders");
        Ok(self.synchronizer.sync(&token).await)
    }

    /// Runs [`refresh`](Self::refresh) unless `shutdown` resolves first.
    ///
    /// Returns `None` if `shutdown` won; the in-flight request is dropped and
    /// the stored reminders are left as they were.
    pub async fn refresh_until<F>(&self, shutdown: F) -> Option<Result<SyncOutcome, SessionError>>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.refresh() => Some(result),
            () = shutdown => {
                info!("Refresh cancelled by shutdown");
                None
            }
        }
    }
}

/// Trims a captured value and rejects blanks and placeholders.
fn normalize_token(raw: &str) -> Option<&str> {
    let token = raw.trim();
    let absent = token.is_empty()
        || ABSENT_TOKEN_MARKERS
            .iter()
            .any(|marker| token.eq_ignore_ascii_case(marker));
    (!absent).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_token_trims() {
        assert_eq!(normalize_token("  abc.def \n"), Some("abc.def"));
    }

    #[test]
    fn test_normalize_token_rejects_blank_and_placeholders() {
        assert_eq!(normalize_token(""), None);
        assert_eq!(normalize_token("   "), None);
        assert_eq!(normalize_token("null"), None);
        assert_eq!(normalize_token("NULL"), None);
        assert_eq!(normalize_token("undefined"), None);
    }

    #[test]
    fn test_session_error_display() {
        assert_eq!(
            SessionError::NoToken.to_string(),
            "no token stored; capture one first"
        );
        assert_eq!(
            SessionError::InvalidToken.to_string(),
            "no usable token in captured value"
        );
    }
}
