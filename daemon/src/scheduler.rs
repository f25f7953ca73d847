//! Notification scheduling and delivery.
//!
//! The notifier hands due reminders to a [`NotificationScheduler`], which
//! enqueues a one-shot alert for a given time (or immediately). The host must
//! call [`NotificationScheduler::request_permission`] once before anything can
//! be scheduled.
//!
//! [`ChannelScheduler`] is the in-process implementation: scheduled
//! notifications are queued on a channel and [`spawn_delivery`] waits for each
//! trigger time before passing the notification to a [`Deliver`] sink.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chrono::Utc;
//! use nudge_daemon::scheduler::{
//!     spawn_delivery, ChannelScheduler, Notification, NotificationScheduler, StdoutDeliver,
//!     Trigger,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let (scheduler, queue) = ChannelScheduler::new();
//!     let _delivery = spawn_delivery(queue, Arc::new(StdoutDeliver));
//!
//!     scheduler.request_permission().unwrap();
//!     scheduler
//!         .schedule(Notification::new("Pay bill", "Due now", Trigger::At(Utc::now())))
//!         .unwrap();
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::types::{Reminder, ReminderId};

/// Errors that can occur while scheduling a notification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The host has not performed the permission step yet.
    #[error("notification permission not granted")]
    PermissionNotGranted,

    /// The delivery side has shut down.
    #[error("notification channel closed")]
    ChannelClosed,
}

/// When a notification should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// As soon as possible.
    Immediate,
    /// At the given instant; instants in the past are shown immediately.
    At(DateTime<Utc>),
}

impl Trigger {
    /// Returns how long to wait from `now` until the trigger fires.
    #[must_use]
    pub fn delay_from(&self, now: DateTime<Utc>) -> Duration {
        match self {
            Self::Immediate => Duration::ZERO,
            Self::At(at) => (*at - now).to_std().unwrap_or(Duration::ZERO),
        }
    }
}

/// A one-shot alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Reminder that produced this notification, if any.
    pub reminder_id: Option<ReminderId>,
    pub title: String,
    pub body: String,
    pub trigger: Trigger,
}

impl Notification {
    /// Creates a notification not tied to a reminder.
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            reminder_id: None,
            title: title.into(),
            body: body.into(),
            trigger,
        }
    }

    /// Builds the notification for a due reminder, triggered at its due time.
    #[must_use]
    pub fn for_reminder(reminder: &Reminder) -> Self {
        let (trigger, body) = match reminder.due_at() {
            Some(at) => (
                Trigger::At(at),
                format!(
                    "Due at {}",
                    at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
                ),
            ),
            None => (Trigger::Immediate, "Due now".to_string()),
        };

        Self {
            reminder_id: Some(reminder.id.clone()),
            title: reminder.title.clone(),
            body,
            trigger,
        }
    }
}

/// Capability to enqueue one-shot alerts.
pub trait NotificationScheduler: Send + Sync {
    /// Performs the one-time permission step. Must succeed before [`schedule`](Self::schedule).
    ///
    /// # Errors
    ///
    /// Returns `NotifyError` if the platform refuses notifications.
    fn request_permission(&self) -> Result<(), NotifyError>;

    /// Enqueues `notification` for display at its trigger time.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::PermissionNotGranted` before the permission step,
    /// or another `NotifyError` if the notification cannot be enqueued.
    fn schedule(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Scheduler that queues notifications on an in-process channel.
#[derive(Debug)]
pub struct ChannelScheduler {
    tx: mpsc::UnboundedSender<Notification>,
    granted: AtomicBool,
}

impl ChannelScheduler {
    /// Creates a scheduler and the receiving end of its queue.
    ///
    /// Pass the receiver to [`spawn_delivery`], or drain it directly.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                granted: AtomicBool::new(false),
            },
            rx,
        )
    }

    /// Returns `true` once permission has been granted.
    #[must_use]
    pub fn is_permitted(&self) -> bool {
        self.granted.load(Ordering::Acquire)
    }
}

impl NotificationScheduler for ChannelScheduler {
    fn request_permission(&self) -> Result<(), NotifyError> {
        if self.tx.is_closed() {
            return Err(NotifyError::ChannelClosed);
        }
        self.granted.store(true, Ordering::Release);
        Ok(())
    }

    fn schedule(&self, notification: Notification) -> Result<(), NotifyError> {
        if !self.is_permitted() {
            return Err(NotifyError::PermissionNotGranted);
        }
        debug!(title = %notification.title, trigger = ?notification.trigger, "Notification queued");
        self.tx
            .send(notification)
            .map_err(|_| NotifyError::ChannelClosed)
    }
}

/// Sink that actually shows a notification once its trigger time arrives.
pub trait Deliver: Send + Sync + 'static {
    fn deliver(&self, notification: &Notification);
}

/// Prints notifications to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutDeliver;

impl Deliver for StdoutDeliver {
    fn deliver(&self, notification: &Notification) {
        info!(title = %notification.title, "Notification shown");
        println!("[nudge] {}: {}", notification.title, notification.body);
    }
}

/// Spawns the delivery loop for a [`ChannelScheduler`] queue.
///
/// Each notification is delivered once its trigger time arrives. The task
/// finishes when the queue closes (every scheduler handle dropped). Delayed
/// notifications still waiting at that point are delivered right away, in
/// trigger order; their reminders are already persisted as shown.
/// The returned count is the number of notifications delivered.
pub fn spawn_delivery<D: Deliver>(
    mut queue: mpsc::UnboundedReceiver<Notification>,
    sink: Arc<D>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        // Sorted by deadline; equal deadlines keep arrival order.
        let mut pending: Vec<(Instant, Notification)> = Vec::new();
        let mut delivered = 0;

        loop {
            let next_deadline = pending.first().map(|(at, _)| *at);

            tokio::select! {
                next = queue.recv() => {
                    let Some(notification) = next else {
                        break;
                    };
                    let delay = notification.trigger.delay_from(Utc::now());
                    if delay.is_zero() {
                        sink.deliver(&notification);
                        delivered += 1;
                    } else {
                        debug!(delay_ms = delay.as_millis(), "Delaying notification");
                        let at = Instant::now() + delay;
                        let index = pending.partition_point(|(due, _)| *due <= at);
                        pending.insert(index, (at, notification));
                    }
                }
                () = sleep_until(next_deadline.unwrap_or_else(Instant::now)), if next_deadline.is_some() => {
                    let (_, notification) = pending.remove(0);
                    sink.deliver(&notification);
                    delivered += 1;
                }
            }
        }

        if !pending.is_empty() {
            info!(count = pending.len(), "Queue closed; delivering waiting notifications now");
        }
        for (_, notification) in pending {
            sink.deliver(&notification);
            delivered += 1;
        }
        delivered
    })
}
