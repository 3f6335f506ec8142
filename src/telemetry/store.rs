//! # Telemetry State Store
//!
//! Single owner of the live posture view. Writers go through
//! [`TelemetryStore::apply_angle_reading`] and
//! [`TelemetryStore::apply_daily_aggregate`]; readers get whole snapshots
//! through a `tokio::sync::watch` channel and alerts through a
//! `tokio::sync::broadcast` channel.
//!
//! Each axis (angle, daily aggregate) is sequenced independently. An update
//! carrying a sequence number not newer than the last applied one for its axis
//! is dropped, so a late response can never overwrite fresher data.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use super::alert::{AlertDebouncer, AlertEvent, AlertState};
use super::timeline::{PostureStats, Timeline, TimelineAggregator, TimelineMode};
use super::types::{AngleReading, DailyAggregate};

/// Alert events buffered per subscriber before the oldest are dropped
const ALERT_CHANNEL_CAPACITY: usize = 16;

/// Server and local percentages further apart than this are logged
const PERCENT_DIVERGENCE_TOLERANCE: f64 = 0.5;

/// Read-only view handed to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    pub current_angle_degrees: f64,
    /// `None` until the first reading is applied
    pub observed_at: Option<DateTime<Utc>>,
    pub is_above_threshold: bool,
    pub good_percent: f64,
    pub bad_percent: f64,
    /// Every valid sample of the day
    pub timeline: Timeline,
    /// Slouched samples only
    pub slouch_timeline: Timeline,
    /// Samples dropped because their time did not parse
    pub excluded_samples: usize,
    pub alert: AlertState,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        let stats = PostureStats::default();
        Self {
            current_angle_degrees: 0.0,
            observed_at: None,
            is_above_threshold: false,
            good_percent: stats.good_percent,
            bad_percent: stats.bad_percent,
            timeline: Timeline::empty(TimelineMode::Bucketed),
            slouch_timeline: Timeline::empty(TimelineMode::Filtered),
            excluded_samples: 0,
            alert: AlertState::default(),
        }
    }
}

/// Writer-side bookkeeping, never exposed to readers
#[derive(Debug)]
struct WriterState {
    debouncer: AlertDebouncer,
    last_angle_seq: Option<u64>,
    last_aggregate_seq: Option<u64>,
}

pub struct TelemetryStore {
    aggregator: TimelineAggregator,
    writer: Mutex<WriterState>,
    snapshot_tx: watch::Sender<TelemetrySnapshot>,
    alert_tx: broadcast::Sender<AlertEvent>,
}

impl std::fmt::Debug for TelemetryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryStore")
            .field("aggregator", &self.aggregator)
            .finish_non_exhaustive()
    }
}

impl TelemetryStore {
    pub fn new(threshold_degrees: f64, aggregator: TimelineAggregator) -> Self {
        let (snapshot_tx, _) = watch::channel(TelemetrySnapshot::default());
        let (alert_tx, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);

        Self {
            aggregator,
            writer: Mutex::new(WriterState {
                debouncer: AlertDebouncer::new(threshold_degrees),
                last_angle_seq: None,
                last_aggregate_seq: None,
            }),
            snapshot_tx,
            alert_tx,
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Receiver notified on every applied update
    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Receiver for `Quiet -> Alerted` transitions
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertEvent> {
        self.alert_tx.subscribe()
    }

    /// Replace the current angle.
    ///
    /// Returns `false` when the reading was discarded (stale sequence or
    /// non-finite angle).
    pub fn apply_angle_reading(&self, seq: u64, reading: AngleReading) -> bool {
        let mut writer = self.lock_writer();

        if writer.last_angle_seq.is_some_and(|last| seq <= last) {
            debug!("Discarding stale angle reading #{} ({:.2}°)", seq, reading.angle_degrees);
            return false;
        }

        if !reading.angle_degrees.is_finite() {
            warn!("Discarding non-finite angle reading #{}", seq);
            return false;
        }

        writer.last_angle_seq = Some(seq);
        let alert = writer.debouncer.observe(&reading);
        let is_above_threshold = writer.debouncer.is_breach(reading.angle_degrees);
        let alert_state = writer.debouncer.state();

        self.snapshot_tx.send_modify(|snapshot| {
            snapshot.current_angle_degrees = reading.angle_degrees;
            snapshot.observed_at = Some(reading.observed_at);
            snapshot.is_above_threshold = is_above_threshold;
            snapshot.alert = alert_state;
        });

        if let Some(event) = alert {
            warn!(
                "Poor posture detected: {:.2}° (threshold {:.1}°)",
                event.angle_degrees, event.threshold_degrees
            );
            // No subscribers is fine; the snapshot still carries the state
            let _ = self.alert_tx.send(event);
        }

        true
    }

    /// Replace the whole daily view.
    ///
    /// Percentages are always recomputed from the samples. Returns `false` when
    /// the aggregate was discarded as stale.
    pub fn apply_daily_aggregate(&self, seq: u64, aggregate: DailyAggregate) -> bool {
        let mut writer = self.lock_writer();

        if writer.last_aggregate_seq.is_some_and(|last| seq <= last) {
            debug!("Discarding stale daily aggregate #{}", seq);
            return false;
        }
        writer.last_aggregate_seq = Some(seq);

        let report = self.aggregator.rebuild(&aggregate.samples);
        log_divergence(&aggregate, &report.stats);

        self.snapshot_tx.send_modify(|snapshot| {
            snapshot.good_percent = report.stats.good_percent;
            snapshot.bad_percent = report.stats.bad_percent;
            snapshot.timeline = report.timeline;
            snapshot.slouch_timeline = report.slouch_timeline;
            snapshot.excluded_samples = report.excluded.len();
        });

        debug!(
            "Applied daily aggregate #{}: {} samples, {:.1}% good",
            seq,
            report.stats.sample_count(),
            report.stats.good_percent
        );

        true
    }

    fn lock_writer(&self) -> MutexGuard<'_, WriterState> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn log_divergence(aggregate: &DailyAggregate, stats: &PostureStats) {
    let pairs = [
        ("good", aggregate.server_good_percent, stats.good_percent),
        ("bad", aggregate.server_bad_percent, stats.bad_percent),
    ];

    for (label, server, local) in pairs {
        if let Some(server) = server {
            if (server - local).abs() > PERCENT_DIVERGENCE_TOLERANCE {
                debug!(
                    "Server {} percentage {:.2} differs from local {:.2}; using local",
                    label, server, local
                );
            }
        }
    }
}
