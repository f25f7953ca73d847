//! HTTP client for the remote reminders endpoint.
//!
//! The endpoint is read with a bearer token and answers with
//! `{ "data": [ { "id", "title", "started_date" }, ... ] }`.
//!
//! - Connection pooling via reqwest
//! - Per-request timeout
//! - Status classification (auth failure, other non-success, malformed body)
//!
//! Retrying is left to the caller: a failed fetch is simply repeated on the
//! next token capture or refresh.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use nudge_daemon::source::ReminderSource;
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = ReminderSource::new(
//!         "https://app.example.com/api/reminders".to_string(),
//!         Duration::from_secs(30),
//!     )
//!     .unwrap();
//!
//!     let records = source.fetch("token-from-page").await.unwrap();
//!     println!("{} reminders", records.len());
//! }
//! ```

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{RawReminder, RemindersResponse};

/// Default HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest server message kept in an error.
const MAX_ERROR_MESSAGE_LEN: usize = 256;

/// Errors that can occur while fetching reminders.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Transport-level failure (connect, timeout, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint rejected the token (401 or 403).
    #[error("authentication failed: status {status}")]
    AuthFailed { status: u16 },

    /// The endpoint returned another non-success status.
    #[error("server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// The body did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// Client for the reminders endpoint.
#[derive(Debug, Clone)]
pub struct ReminderSource {
    url: String,
    client: Client,
}

impl ReminderSource {
    /// Creates a client for `url` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Http` if the HTTP client cannot be built.
    pub fn new(url: String, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(2)
            .build()?;

        Ok(Self { url, client })
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches the raw reminder records visible to `token`.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` if the request cannot be sent, the status is not a
    /// success, or the body is not a reminders document.
    pub async fn fetch(&self, token: &str) -> Result<Vec<RawReminder>, SourceError> {
        debug!(url = %self.url, "Fetching reminders");

        let response = self
            .client
            .get(&self.url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();

        match status {
            _ if status.is_success() => {
                let body = response.bytes().await?;
                let parsed: RemindersResponse =
                    serde_json::from_slice(&body).map_err(SourceError::Malformed)?;
                debug!(records = parsed.data.len(), "Reminders fetched");
                Ok(parsed.data)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(status = status.as_u16(), "Reminder endpoint rejected token");
                Err(SourceError::AuthFailed {
                    status: status.as_u16(),
                })
            }
            _ => {
                let mut message = response.text().await.unwrap_or_default();
                truncate_message(&mut message);
                Err(SourceError::ServerError {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

/// Truncates `message` to at most [`MAX_ERROR_MESSAGE_LEN`] bytes on a char boundary.
fn truncate_message(message: &mut String) {
    if message.len() <= MAX_ERROR_MESSAGE_LEN {
        return;
    }
    let mut end = MAX_ERROR_MESSAGE_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message.truncate(end);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_keeps_url() {
        let source = ReminderSource::new(
            "http://localhost:4173/api/reminders".to_string(),
            DEFAULT_REQUEST_TIMEOUT,
        )
        .unwrap();
        assert_eq!(source.url(), "http://localhost:4173/api/reminders");
    }

    #[test]
    fn test_truncate_message_respects_char_boundary() {
        let mut message = "é".repeat(200);
        truncate_message(&mut message);

        assert!(message.len() <= MAX_ERROR_MESSAGE_LEN);
        assert_eq!(message.chars().count(), MAX_ERROR_MESSAGE_LEN / 2);
    }

    #[test]
    fn test_truncate_message_leaves_short_messages() {
        let mut message = "Internal error".to_string();
        truncate_message(&mut message);
        assert_eq!(message, "Internal error");
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::AuthFailed { status: 401 };
        assert_eq!(err.to_string(), "authentication failed: status 401");

        let err = SourceError::ServerError {
            status: 500,
            message: "Internal error".to_string(),
        };
        assert_eq!(err.to_string(), "server error: 500 - Internal error");

        let json_err = serde_json::from_str::<RemindersResponse>("[]").unwrap_err();
        let err = SourceError::Malformed(json_err);
        assert!(err.to_string().starts_with("malformed response:"));
    }
}
