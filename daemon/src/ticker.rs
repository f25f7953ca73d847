//! Fixed-cadence driver for the due-time notifier.
//!
//! Ticks run one at a time on the ticker task, so a slow tick delays the next
//! one instead of overlapping it; missed ticks are skipped rather than
//! replayed in a burst. A failing tick is logged and the loop keeps going.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::notifier::DueTimeNotifier;

/// Default interval between ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Runs `notifier` every `period` until `shutdown` resolves.
///
/// The store round-trip runs on the blocking pool. Returns the number of
/// ticks that ran, including failed ones.
pub async fn run_ticker<F>(notifier: Arc<DueTimeNotifier>, period: Duration, shutdown: F) -> u64
where
    F: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    info!(period_ms = period.as_millis(), "Due-time ticker started");

    let mut ticks = 0_u64;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                break;
            }
            _ = ticker.tick() => {
                ticks += 1;
                let notifier = Arc::clone(&notifier);
                match tokio::task::spawn_blocking(move || notifier.tick()).await {
                    Ok(Ok(report)) => {
                        if report.notified > 0 {
                            debug!(tick = ticks, notified = report.notified, "Tick notified reminders");
                        }
                    }
                    Ok(Err(e)) => {
                        error!(tick = ticks, error = %e, "Tick failed, will retry next interval");
                    }
                    Err(e) => {
                        error!(tick = ticks, error = %e, "Tick task aborted, will retry next interval");
                    }
                }
            }
        }
    }

    info!(ticks, "Due-time ticker stopped");
    ticks
}
