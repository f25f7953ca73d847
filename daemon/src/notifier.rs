//! Due-time notifier.
//!
//! Each tick reads the persisted reminders, schedules a notification for every
//! pending reminder whose due time lies within the due window of the current
//! time, and marks those reminders as shown. The window is symmetric: a
//! reminder is still notified if it became due less than one window ago.
//!
//! Store errors propagate out of [`DueTimeNotifier::tick`]; the next tick
//! starts again from the last successfully persisted state. A reminder the
//! scheduler refuses stays pending and is retried on the next tick.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::scheduler::{Notification, NotificationScheduler};
use crate::store::{ReminderStore, StoreError};

/// Default due window in milliseconds.
pub const DEFAULT_DUE_WINDOW_MS: i64 = 60_000;

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Reminders in the persisted collection.
    pub total: usize,
    /// Reminders notified and marked shown during this tick.
    pub notified: usize,
    /// Due reminders the scheduler refused; they stay pending.
    pub failed: usize,
}

/// Scans persisted reminders and fires notifications for due ones.
pub struct DueTimeNotifier {
    store: Arc<ReminderStore>,
    scheduler: Arc<dyn NotificationScheduler>,
    window_ms: i64,
}

impl DueTimeNotifier {
    /// Creates a notifier using [`DEFAULT_DUE_WINDOW_MS`].
    #[must_use]
    pub fn new(store: Arc<ReminderStore>, scheduler: Arc<dyn NotificationScheduler>) -> Self {
        Self::with_window(store, scheduler, DEFAULT_DUE_WINDOW_MS)
    }

    /// Creates a notifier with a custom due window.
    #[must_use]
    pub fn with_window(
        store: Arc<ReminderStore>,
        scheduler: Arc<dyn NotificationScheduler>,
        window_ms: i64,
    ) -> Self {
        Self {
            store,
            scheduler,
            window_ms,
        }
    }

    /// Returns the due window in milliseconds.
    #[must_use]
    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    /// Runs one check against the current time.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the collection cannot be read or written back.
    pub fn tick(&self) -> Result<TickReport, StoreError> {
        self.tick_at(Utc::now())
    }

    /// Runs one check against `now`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the collection cannot be read or written back.
    pub fn tick_at(&self, now: DateTime<Utc>) -> Result<TickReport, StoreError> {
        let now_ms = now.timestamp_millis();

        let report = self.store.update_reminders(|reminders| {
            let mut report = TickReport {
                total: reminders.len(),
                ..TickReport::default()
            };

            for reminder in reminders.iter_mut() {
                if !reminder.is_pending() || !reminder.is_within_window(now_ms, self.window_ms) {
                    continue;
                }

                match self.scheduler.schedule(Notification::for_reminder(reminder)) {
                    Ok(()) => {
                        reminder.mark_shown();
                        report.notified += 1;
                        info!(id = %reminder.id, started_at = reminder.started_at, "Reminder notified");
                    }
                    Err(e) => {
                        report.failed += 1;
                        warn!(id = %reminder.id, error = %e, "Failed to schedule notification");
                    }
                }
            }

            report
        })?;

        debug!(
            total = report.total,
            notified = report.notified,
            failed = report.failed,
            "Tick complete"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{ChannelScheduler, NotifyError, Trigger};
    use crate::store::{KeyValueStore, MemoryStore, REMINDERS_KEY};
    use crate::types::{Reminder, ReminderId};
    use tokio::sync::mpsc::UnboundedReceiver;

    const NOW: i64 = 1_700_000_000_000;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(NOW).unwrap()
    }

    fn reminder(id: &str, started_at: i64, is_shown: bool) -> Reminder {
        Reminder {
            id: ReminderId::new(id),
            title: format!("reminder {id}"),
            started_at,
            is_shown,
        }
    }

    fn setup(
        reminders: &[Reminder],
    ) -> (
        DueTimeNotifier,
        Arc<ReminderStore>,
        UnboundedReceiver<Notification>,
    ) {
        let store = Arc::new(ReminderStore::new(Arc::new(MemoryStore::new())));
        store.replace_reminders(reminders).unwrap();
        let (scheduler, rx) = ChannelScheduler::new();
        scheduler.request_permission().unwrap();
        let notifier = DueTimeNotifier::new(Arc::clone(&store), Arc::new(scheduler));
        (notifier, store, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(notification) = rx.try_recv() {
            out.push(notification);
        }
        out
    }

    /// Refuses everything, as a platform without notification permission would.
    struct DenyAll;

    impl NotificationScheduler for DenyAll {
        fn request_permission(&self) -> Result<(), NotifyError> {
            Err(NotifyError::PermissionNotGranted)
        }

        fn schedule(&self, _notification: Notification) -> Result<(), NotifyError> {
            Err(NotifyError::PermissionNotGranted)
        }
    }

    #[test]
    fn test_empty_store_tick_is_a_no_op() {
        let kv = Arc::new(MemoryStore::new());
        let store = Arc::new(ReminderStore::new(kv.clone()));
        let (scheduler, mut rx) = ChannelScheduler::new();
        scheduler.request_permission().unwrap();
        let notifier = DueTimeNotifier::new(Arc::clone(&store), Arc::new(scheduler));

        let report = notifier.tick_at(now()).unwrap();

        assert_eq!(report, TickReport::default());
        assert!(drain(&mut rx).is_empty());
        assert!(store.reminders().unwrap().is_empty());
        assert!(kv.get(REMINDERS_KEY).unwrap().is_none());
    }

    #[test]
    fn test_reminder_thirty_seconds_past_fires() {
        let (notifier, store, mut rx) = setup(&[reminder("1", NOW - 30_000, false)]);

        let report = notifier.tick_at(now()).unwrap();

        assert_eq!(report.notified, 1);
        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "reminder 1");
        assert_eq!(
            sent[0].trigger,
            Trigger::At(DateTime::from_timestamp_millis(NOW - 30_000).unwrap())
        );
        assert!(store.reminders().unwrap()[0].is_shown);
    }

    #[test]
    fn test_shown_reminder_does_not_fire_again() {
        let (notifier, store, mut rx) = setup(&[reminder("1", NOW - 90_000, true)]);

        let report = notifier.tick_at(now()).unwrap();

        assert_eq!(report.notified, 0);
        assert!(drain(&mut rx).is_empty());
        assert!(store.reminders().unwrap()[0].is_shown);
    }

    #[test]
    fn test_future_reminder_outside_window_waits() {
        let (notifier, store, mut rx) = setup(&[reminder("1", NOW + 120_000, false)]);

        notifier.tick_at(now()).unwrap();

        assert!(drain(&mut rx).is_empty());
        assert!(store.reminders().unwrap()[0].is_pending());
    }

    #[test]
    fn test_window_boundary_is_exclusive() {
        let (notifier, _store, mut rx) = setup(&[
            reminder("edge-past", NOW - 60_000, false),
            reminder("edge-future", NOW + 60_000, false),
            reminder("inside", NOW + 59_999, false),
        ]);

        let report = notifier.tick_at(now()).unwrap();

        assert_eq!(report.notified, 1);
        assert_eq!(drain(&mut rx)[0].title, "reminder inside");
    }

    #[test]
    fn test_shown_state_is_monotonic_across_ticks() {
        let (notifier, store, mut rx) = setup(&[reminder("1", NOW, false)]);

        notifier.tick_at(now()).unwrap();
        for offset in [1_000, 30_000, 120_000, -120_000] {
            notifier
                .tick_at(DateTime::from_timestamp_millis(NOW + offset).unwrap())
                .unwrap();
            assert!(store.reminders().unwrap()[0].is_shown);
        }

        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_only_due_reminders_change() {
        let (notifier, store, _rx) = setup(&[
            reminder("due", NOW + 5_000, false),
            reminder("later", NOW + 600_000, false),
        ]);

        let report = notifier.tick_at(now()).unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.notified, 1);
        let stored = store.reminders().unwrap();
        assert!(stored[0].is_shown);
        assert!(stored[1].is_pending());
    }

    #[test]
    fn test_refused_reminder_stays_pending() {
        let store = Arc::new(ReminderStore::new(Arc::new(MemoryStore::new())));
        store
            .replace_reminders(&[reminder("1", NOW, false)])
            .unwrap();
        let notifier = DueTimeNotifier::new(Arc::clone(&store), Arc::new(DenyAll));

        let report = notifier.tick_at(now()).unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.notified, 0);
        assert!(store.reminders().unwrap()[0].is_pending());
    }

    #[test]
    fn test_corrupt_store_propagates() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(REMINDERS_KEY, "oops").unwrap();
        let store = Arc::new(ReminderStore::new(kv));
        let (scheduler, _rx) = ChannelScheduler::new();
        let notifier = DueTimeNotifier::new(store, Arc::new(scheduler));

        assert!(matches!(
            notifier.tick_at(now()),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_custom_window() {
        let store = Arc::new(ReminderStore::new(Arc::new(MemoryStore::new())));
        store
            .replace_reminders(&[reminder("1", NOW + 20_000, false)])
            .unwrap();
        let (scheduler, mut rx) = ChannelScheduler::new();
        scheduler.request_permission().unwrap();
        let notifier = DueTimeNotifier::with_window(Arc::clone(&store), Arc::new(scheduler), 10_000);

        notifier.tick_at(now()).unwrap();
        assert!(drain(&mut rx).is_empty());
        assert_eq!(notifier.window_ms(), 10_000);
    }
}
