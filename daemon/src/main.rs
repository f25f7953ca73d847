//! Nudge - reminder sync and due-time notification daemon.
//!
//! # Commands
//!
//! - `nudge run`: Start the daemon (startup sync, due-time ticker, delivery)
//! - `nudge set-token <TOKEN>`: Store a captured token and sync with it
//! - `nudge refresh`: Resync reminders with the stored token
//! - `nudge list`: Print the stored reminders
//!
//! # Environment Variables
//!
//! See `nudge_daemon::config` for available configuration options.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nudge_daemon::config::Config;
use nudge_daemon::notifier::DueTimeNotifier;
use nudge_daemon::scheduler::{spawn_delivery, ChannelScheduler, NotificationScheduler, StdoutDeliver};
use nudge_daemon::session::{Session, SessionError};
use nudge_daemon::source::ReminderSource;
use nudge_daemon::store::{FileStore, ReminderStore};
use nudge_daemon::sync::{ReminderSynchronizer, SyncOutcome};
use nudge_daemon::ticker::run_ticker;

/// Nudge - reminder sync and due-time notification daemon.
///
/// Pulls reminders from the configured endpoint with a captured bearer
/// token and raises a notification when each one comes due.
#[derive(Parser, Debug)]
#[command(name = "nudge")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    NUDGE_API_URL              Reminders endpoint (required)
    NUDGE_DATA_DIR             Token and reminder storage (default: ~/.nudge)
    NUDGE_TICK_INTERVAL_MS     Due-time check interval (default: 1000)
    NUDGE_DUE_WINDOW_MS        Due window either side of a reminder (default: 60000)
    NUDGE_REQUEST_TIMEOUT_SECS Reminder fetch timeout (default: 30)
    RUST_LOG                   Log filter (default: info)

EXAMPLES:
    # Store the token captured from the web app and sync
    nudge set-token eyJhbGciOi...

    # Start the daemon (send SIGHUP to refresh)
    export NUDGE_API_URL=https://app.example.com/api/reminders
    nudge run
")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon.
    ///
    /// Syncs once if a token is stored, then checks for due reminders every
    /// tick interval. SIGHUP triggers a refresh.
    Run,

    /// Store a captured token and sync reminders with it.
    SetToken {
        /// Token value as read from the web app's local storage.
        token: String,
    },

    /// Resync reminders using the stored token.
    Refresh,

    /// Print the stored reminders.
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    match cli.command {
        Command::Run => runtime.block_on(run_daemon()),
        Command::SetToken { token } => runtime.block_on(run_set_token(token)),
        Command::Refresh => runtime.block_on(run_refresh()),
        Command::List => run_list(),
    }
}

/// Loads configuration and opens the store.
fn open_store(config: &Config) -> Result<Arc<ReminderStore>> {
    let file_store = FileStore::open(&config.data_dir).context(format!(
        "Failed to open data directory {}",
        config.data_dir.display()
    ))?;
    Ok(Arc::new(ReminderStore::new(Arc::new(file_store))))
}

/// Builds the session for the configured endpoint.
fn build_session(config: &Config, store: Arc<ReminderStore>) -> Result<Session> {
    let source = ReminderSource::new(config.api_url.clone(), config.request_timeout)
        .context("Failed to create HTTP client")?;
    Ok(Session::new(ReminderSynchronizer::new(source, store)))
}

fn load_config() -> Result<Config> {
    Config::from_env().context("Failed to load configuration")
}

/// Runs the set-token command.
async fn run_set_token(token: String) -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config)?;
    let session = build_session(&config, store)?;

    let outcome = session
        .on_token_captured(&token)
        .await
        .context("Failed to store token")?;
    report_outcome(outcome);
    Ok(())
}

/// Runs the refresh command.
async fn run_refresh() -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config)?;
    let session = build_session(&config, store)?;

    let outcome = session.refresh().await.context("Refresh failed")?;
    report_outcome(outcome);
    Ok(())
}

/// Runs the list command.
fn run_list() -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config)?;
    let reminders = store.reminders().context("Failed to read reminders")?;

    if reminders.is_empty() {
        println!("No reminders stored.");
        return Ok(());
    }

    for reminder in reminders {
        let due = DateTime::from_timestamp_millis(reminder.started_at)
            .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| reminder.started_at.to_string());
        let state = if reminder.is_shown { "shown" } else { "pending" };
        println!("{:<8} {}  {:<7} {}", reminder.id, due, state, reminder.title);
    }
    Ok(())
}

/// Runs the daemon.
async fn run_daemon() -> Result<()> {
    info!("Starting Nudge daemon");

    let config = load_config()?;
    info!(
        api_url = %config.api_url,
        data_dir = %config.data_dir.display(),
        tick_interval_ms = config.tick_interval.as_millis(),
        due_window_ms = config.due_window_ms,
        "Configuration loaded"
    );

    let store = open_store(&config)?;
    let session = build_session(&config, Arc::clone(&store))?;

    let (scheduler, queue) = ChannelScheduler::new();
    scheduler
        .request_permission()
        .context("Notification permission refused")?;
    let delivery = spawn_delivery(queue, Arc::new(StdoutDeliver));

    let notifier = Arc::new(DueTimeNotifier::with_window(
        Arc::clone(&store),
        Arc::new(scheduler),
        config.due_window_ms,
    ));

    // The page exposes the token on every load, so a stored token means a sync.
    match session.refresh().await {
        Ok(outcome) => report_outcome(outcome),
        Err(SessionError::NoToken) => {
            info!("No token stored yet; run 'nudge set-token' to start syncing");
        }
        Err(e) => warn!(error = %e, "Startup sync failed"),
    }

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let ticker = tokio::spawn(run_ticker(notifier, config.tick_interval, async move {
        let _ = stop_rx.await;
    }));

    info!("Daemon running. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = wait_for_shutdown() => {
                info!("Shutdown signal received");
                break;
            }
            _ = wait_for_refresh() => {
                match session.refresh_until(wait_for_shutdown()).await {
                    Some(Ok(outcome)) => report_outcome(outcome),
                    Some(Err(e)) => warn!(error = %e, "Refresh failed"),
                    None => {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }
    }

    info!("Shutting down...");
    let _ = stop_tx.send(());
    let ticks = ticker.await.context("Ticker task failed")?;

    // The ticker held the last scheduler handle; delivery flushes what is still
    // waiting and stops.
    let delivered = delivery.await.context("Delivery task failed")?;

    info!(ticks, delivered, "Daemon stopped");
    Ok(())
}

/// Logs a sync outcome for the user.
fn report_outcome(outcome: SyncOutcome) {
    match outcome {
        SyncOutcome::Replaced {
            stored,
            dropped_past,
            dropped_invalid,
        } => info!(stored, dropped_past, dropped_invalid, "Sync complete"),
        SyncOutcome::Skipped(reason) => {
            warn!(?reason, "Sync skipped; stored reminders unchanged");
        }
    }
}

/// Initializes the logging subsystem.
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .init();
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Waits for a user refresh request (SIGHUP). Never resolves off unix.
async fn wait_for_refresh() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::hangup()) {
            Ok(mut hangup) => {
                hangup.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGHUP handler; refresh disabled");
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(not(unix))]
    std::future::pending::<()>().await;
}
