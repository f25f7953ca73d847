//! Reminder synchronization.
//!
//! A sync fetches the reminder records visible to a token, normalizes them,
//! keeps only those due at or after the current time, and replaces the whole
//! persisted collection. Nothing is merged: shown state for reminders that are
//! still reported is reset on every resync.
//!
//! A sync never fails from the caller's point of view. Transport errors,
//! rejected tokens, non-success statuses, malformed bodies and store write
//! errors are logged and reported as [`SyncOutcome::Skipped`], leaving the
//! persisted collection untouched.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::source::{ReminderSource, SourceError};
use crate::store::ReminderStore;
use crate::types::{RawReminder, Reminder};

/// Why a sync left the persisted collection untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The token was empty.
    EmptyToken,
    /// The endpoint rejected the token.
    Unauthorized,
    /// The request could not be completed.
    Transport,
    /// The endpoint answered with a non-success status.
    ServerStatus(u16),
    /// The body was not a reminders document.
    Malformed,
    /// The new collection could not be written.
    StoreWrite,
}

/// Result of a single sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The persisted collection was replaced.
    Replaced {
        /// Reminders now stored.
        stored: usize,
        /// Records dropped because they were already due.
        dropped_past: usize,
        /// Records dropped because their date did not parse or their id repeated.
        dropped_invalid: usize,
    },
    /// Nothing was written.
    Skipped(SkipReason),
}

impl SyncOutcome {
    /// Returns `true` if the persisted collection was replaced.
    #[must_use]
    pub fn is_replaced(&self) -> bool {
        matches!(self, Self::Replaced { .. })
    }
}

/// Reminders kept after normalization, plus drop counts.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Normalized {
    pub reminders: Vec<Reminder>,
    pub dropped_past: usize,
    pub dropped_invalid: usize,
}

/// Normalizes wire records and drops anything due strictly before `now_ms`.
///
/// Identifiers are kept unique; the first record with a given id wins.
pub(crate) fn normalize(records: Vec<RawReminder>, now_ms: i64) -> Normalized {
    let mut out = Normalized::default();
    let mut seen = HashSet::new();

    for record in records {
        let raw_date = record.started_date.clone();
        let Some(reminder) = Reminder::from_raw(record) else {
            warn!(started_date = %raw_date, "Dropping reminder with unparseable date");
            out.dropped_invalid += 1;
            continue;
        };

        if reminder.started_at < now_ms {
            out.dropped_past += 1;
            continue;
        }

        if !seen.insert(reminder.id.clone()) {
            warn!(id = %reminder.id, "Dropping reminder with duplicate id");
            out.dropped_invalid += 1;
            continue;
        }

        out.reminders.push(reminder);
    }

    out
}

/// Pulls reminders from the remote source into the store.
pub struct ReminderSynchronizer {
    source: ReminderSource,
    store: Arc<ReminderStore>,
}

impl ReminderSynchronizer {
    #[must_use]
    pub fn new(source: ReminderSource, store: Arc<ReminderStore>) -> Self {
        Self { source, store }
    }

    /// Returns the store this synchronizer writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<ReminderStore> {
        &self.store
    }

    /// Runs a sync using the current time as the cut-off.
    pub async fn sync(&self, token: &str) -> SyncOutcome {
        self.sync_at(token, Utc::now()).await
    }

    /// Runs a sync, dropping reminders due strictly before `now`.
    pub async fn sync_at(&self, token: &str, now: DateTime<Utc>) -> SyncOutcome {
        if token.trim().is_empty() {
            warn!("Sync skipped: empty token");
            return SyncOutcome::Skipped(SkipReason::EmptyToken);
        }

        let records = match self.source.fetch(token).await {
            Ok(records) => records,
            Err(e) => {
                let reason = skip_reason(&e);
                warn!(error = %e, ?reason, "Reminder fetch failed, keeping stored reminders");
                return SyncOutcome::Skipped(reason);
            }
        };

        let fetched = records.len();
        let normalized = normalize(records, now.timestamp_millis());

        if let Err(e) = self.store.replace_reminders(&normalized.reminders) {
            error!(error = %e, "Failed to store synced reminders");
            return SyncOutcome::Skipped(SkipReason::StoreWrite);
        }

        info!(
            fetched,
            stored = normalized.reminders.len(),
            dropped_past = normalized.dropped_past,
            dropped_invalid = normalized.dropped_invalid,
            "Reminders synced"
        );

        SyncOutcome::Replaced {
            stored: normalized.reminders.len(),
            dropped_past: normalized.dropped_past,
            dropped_invalid: normalized.dropped_invalid,
        }
    }
}

fn skip_reason(err: &SourceError) -> SkipReason {
    match err {
        SourceError::Http(_) => SkipReason::Transport,
        SourceError::AuthFailed { .. } => SkipReason::Unauthorized,
        SourceError::ServerError { status, .. } => SkipReason::ServerStatus(*status),
        SourceError::Malformed(_) => SkipReason::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReminderId;

    const NOW: i64 = 1_700_000_000_000;

    fn raw(id: &str, started_date: &str) -> RawReminder {
        RawReminder {
            id: ReminderId::new(id),
            title: format!("title {id}"),
            started_date: started_date.to_string(),
        }
    }

    fn iso(ms: i64) -> String {
        DateTime::from_timestamp_millis(ms).unwrap().to_rfc3339()
    }

    #[test]
    fn test_normalize_keeps_future_and_now() {
        let normalized = normalize(
            vec![raw("1", &iso(NOW)), raw("2", &iso(NOW + 60_000))],
            NOW,
        );

        assert_eq!(normalized.reminders.len(), 2);
        assert!(normalized.reminders.iter().all(Reminder::is_pending));
        assert_eq!(normalized.reminders[0].started_at, NOW);
        assert_eq!(normalized.dropped_past, 0);
    }

    #[test]
    fn test_normalize_drops_strictly_past() {
        let normalized = normalize(
            vec![raw("1", &iso(NOW - 1)), raw("2", &iso(NOW + 1))],
            NOW,
        );

        assert_eq!(normalized.reminders.len(), 1);
        assert_eq!(normalized.reminders[0].id.as_str(), "2");
        assert_eq!(normalized.dropped_past, 1);
    }

    #[test]
    fn test_normalize_drops_unparseable_dates() {
        let normalized = normalize(vec![raw("1", "whenever"), raw("2", &iso(NOW))], NOW);

        assert_eq!(normalized.reminders.len(), 1);
        assert_eq!(normalized.dropped_invalid, 1);
    }

    #[test]
    fn test_normalize_keeps_first_of_duplicate_ids() {
        let normalized = normalize(
            vec![raw("1", &iso(NOW + 10)), raw("1", &iso(NOW + 20))],
            NOW,
        );

        assert_eq!(normalized.reminders.len(), 1);
        assert_eq!(normalized.reminders[0].started_at, NOW + 10);
        assert_eq!(normalized.dropped_invalid, 1);
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(Vec::new(), NOW), Normalized::default());
    }

    #[test]
    fn test_skip_reason_mapping() {
        assert_eq!(
            skip_reason(&SourceError::AuthFailed { status: 403 }),
            SkipReason::Unauthorized
        );
        assert_eq!(
            skip_reason(&SourceError::ServerError {
                status: 502,
                message: String::new()
            }),
            SkipReason::ServerStatus(502)
        );
    }

    #[test]
    fn test_outcome_is_replaced() {
        assert!(SyncOutcome::Replaced {
            stored: 0,
            dropped_past: 0,
            dropped_invalid: 0
        }
        .is_replaced());
        assert!(!SyncOutcome::Skipped(SkipReason::Transport).is_replaced());
    }
}
