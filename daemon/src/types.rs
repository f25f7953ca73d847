//! Reminder types for Nudge.
//!
//! This module defines the wire records returned by the remote reminders
//! endpoint and the normalized [`Reminder`] that is persisted locally.
//! Persisted reminders serialize to camelCase JSON.

use std::fmt;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Naive timestamp layouts accepted for `started_date`, interpreted in local time.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Opaque reminder identifier.
///
/// The remote endpoint may send identifiers as JSON numbers or strings. Both
/// are kept as their textual form so that `1` and `"1"` name the same reminder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ReminderId(String);

impl ReminderId {
    /// Creates an identifier from its textual form.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl<'de> Deserialize<'de> for ReminderId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum WireId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match WireId::deserialize(deserializer)? {
            WireId::Text(text) => Self(text),
            WireId::Number(number) => Self(number.to_string()),
        })
    }
}

/// A reminder record as returned by the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawReminder {
    pub id: ReminderId,

    #[serde(default)]
    pub title: String,

    /// Due time in one of the formats accepted by [`parse_started_date`].
    pub started_date: String,
}

/// Success body of the reminders endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RemindersResponse {
    pub data: Vec<RawReminder>,
}

/// A normalized, persisted reminder.
///
/// `is_shown` only ever moves from `false` to `true`; see [`Reminder::mark_shown`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    /// Stable identifier, unique within the persisted collection.
    pub id: ReminderId,

    /// Text shown in the notification.
    pub title: String,

    /// Due time in epoch milliseconds.
    pub started_at: i64,

    /// Whether a notification has already been emitted.
    #[serde(default)]
    pub is_shown: bool,
}

impl Reminder {
    /// Creates a pending reminder.
    #[must_use]
    pub fn new(id: ReminderId, title: impl Into<String>, started_at: i64) -> Self {
        Self {
            id,
            title: title.into(),
            started_at,
            is_shown: false,
        }
    }

    /// Normalizes a wire record, returning `None` if its date cannot be parsed.
    #[must_use]
    pub fn from_raw(raw: RawReminder) -> Option<Self> {
        let started_at = parse_started_date(&raw.started_date)?;
        Some(Self::new(raw.id, raw.title, started_at))
    }

    /// Returns `true` while no notification has been emitted.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.is_shown
    }

    /// Marks the reminder as shown. There is no way back to pending.
    pub fn mark_shown(&mut self) {
        self.is_shown = true;
    }

    /// Returns `true` if `now_ms` lies strictly within `window_ms` of the due time,
    /// on either side.
    #[must_use]
    pub fn is_within_window(&self, now_ms: i64, window_ms: i64) -> bool {
        self.started_at.abs_diff(now_ms) < window_ms.unsigned_abs()
    }

    /// Returns the due time as a UTC timestamp.
    #[must_use]
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.started_at)
    }
}

/// Parses a `started_date` value into epoch milliseconds.
///
/// Accepts RFC 3339 timestamps with an offset, naive date-times (with a `T` or
/// a space separator, optional seconds fraction) in local time, and bare dates
/// at local midnight.
///
/// # Example
///
/// ```
/// use nudge_daemon::types::parse_started_date;
///
/// assert_eq!(parse_started_date("1970-01-01T00:00:01Z"), Some(1000));
/// assert_eq!(parse_started_date("tomorrow"), None);
/// ```
#[must_use]
pub fn parse_started_date(value: &str) -> Option<i64> {
    let value = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.timestamp_millis());
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.timestamp_millis())
}
