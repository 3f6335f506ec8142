//! # Posture Telemetry
//!
//! Headless live posture dashboard.
//!
//! Polls the posture sensor's angle service, logs slouch alerts as they are
//! raised and prints a periodic status line built from the shared snapshot.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release -- config/default.toml
//! ```
//!
//! Expected output:
//! ```text
//! INFO posture_telemetry: Posture telemetry v0.1.0 starting...
//! INFO posture_telemetry::telemetry::poller: Fast poll started (1000 ms)
//! WARN posture_telemetry: Poor posture detected! Angle: 112.40°
//! INFO posture_telemetry: angle 97.10° (ok) | good 82.5% / bad 17.5% | 40 samples
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use posture_telemetry::config::{Config, LoggingConfig};
use posture_telemetry::context::TelemetryContext;
use posture_telemetry::telemetry::TelemetrySnapshot;

/// Config file picked up when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Number of snapshot updates between status log lines
const STATUS_LOG_EVERY: u64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config(std::env::args().nth(1))?;
    let _log_guard = init_logging(&config.logging);

    info!("Posture telemetry v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut context = TelemetryContext::connect(config.clone())
        .context("failed to build telemetry client")?;
    let mut snapshots = context.subscribe();
    let mut alerts = context.subscribe_alerts();

    context.start();

    if let Some(user_id) = config.server.user_id.as_deref() {
        if let Some(profile) = context.load_profile(user_id).await {
            info!("Signed in as {} <{}>, avatar {}", profile.name, profile.email, profile.avatar_ref);
        }
    }

    info!("Press Ctrl+C to exit");

    let mut updates: u64 = 0;

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                updates += 1;
                let snapshot = snapshots.borrow_and_update().clone();
                if updates % STATUS_LOG_EVERY == 1 {
                    info!("{}", format_status(&snapshot));
                } else {
                    debug!("{}", format_status(&snapshot));
                }
            }

            alert = alerts.recv() => match alert {
                Ok(event) => warn!("Poor posture detected! Angle: {:.2}°", event.angle_degrees),
                Err(RecvError::Lagged(missed)) => debug!("Missed {} alerts", missed),
                Err(RecvError::Closed) => break,
            },

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    context.stop();

    let stats = context.poller_stats();
    info!(
        "Angle polls: {} ({} failed), daily polls: {} ({} failed)",
        stats.fast_ticks, stats.fast_failures, stats.slow_ticks, stats.slow_failures
    );

    Ok(())
}

fn load_config(path: Option<String>) -> Result<Config> {
    match path {
        Some(path) => Config::load(&path).with_context(|| format!("failed to load {}", path)),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("failed to load {}", DEFAULT_CONFIG_PATH)),
        None => Ok(Config::default()),
    }
}

/// Console logging, plus a daily rolling file when `log_dir` is set.
///
/// `RUST_LOG` overrides the configured level.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "posture-telemetry.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

fn format_status(snapshot: &TelemetrySnapshot) -> String {
    let posture = if snapshot.is_above_threshold { "SLOUCHING" } else { "ok" };
    let samples = snapshot.timeline.buckets.len();

    let mut line = format!(
        "angle {:.2}° ({}) | good {:.1}% / bad {:.1}% | {} samples",
        snapshot.current_angle_degrees, posture, snapshot.good_percent, snapshot.bad_percent, samples
    );
    if snapshot.excluded_samples > 0 {
        line.push_str(&format!(", {} unparsable", snapshot.excluded_samples));
    }
    line
}
