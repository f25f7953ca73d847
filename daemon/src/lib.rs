//! Nudge - reminder sync and due-time notification core.
//!
//! This crate pulls scheduled reminders from a remote endpoint using a bearer
//! token captured by the host shell, persists them locally, and raises a
//! notification for each reminder once it enters its due window.
//!
//! # Overview
//!
//! The host hands over the token once the embedded page exposes it. From
//! there the [`session`] persists it and runs the [`sync`] pipeline, which
//! replaces the stored reminder collection. The [`ticker`] drives the
//! [`notifier`] on a fixed cadence, and due reminders are handed to a
//! [`scheduler`] for delivery.
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types for daemon operations
//! - [`types`]: Reminder data model and wire records
//! - [`store`]: Persistent key-value store and typed reminder access
//! - [`source`]: HTTP client for the remote reminder endpoint
//! - [`sync`]: Fetch, normalize, filter and replace
//! - [`notifier`]: Due-window scan and shown-state transitions
//! - [`scheduler`]: Notification scheduling and delivery
//! - [`session`]: Token capture and user-initiated refresh
//! - [`ticker`]: Fixed-cadence driver for the notifier

pub mod config;
pub mod error;
pub mod notifier;
pub mod scheduler;
pub mod session;
pub mod source;
pub mod store;
pub mod sync;
pub mod ticker;
pub mod types;

pub use config::Config;
pub use error::{NudgeError, Result};
pub use notifier::{DueTimeNotifier, TickReport, DEFAULT_DUE_WINDOW_MS};
pub use scheduler::{
    spawn_delivery, ChannelScheduler, Deliver, Notification, NotificationScheduler, NotifyError,
    StdoutDeliver, Trigger,
};
pub use session::{Session, SessionError};
pub use source::{ReminderSource, SourceError};
pub use store::{FileStore, KeyValueStore, MemoryStore, ReminderStore, StoreError};
pub use sync::{ReminderSynchronizer, SkipReason, SyncOutcome};
pub use ticker::{run_ticker, DEFAULT_TICK_INTERVAL};
pub use types::{parse_started_date, RawReminder, Reminder, ReminderId, RemindersResponse};
