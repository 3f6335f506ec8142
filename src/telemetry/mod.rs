//! # Telemetry Module
//!
//! Live posture telemetry core.
//!
//! This module handles:
//! - Polling the angle and daily timeline endpoints on independent loops
//! - Sequencing responses so late replies never overwrite fresher data
//! - Rebuilding the timeline geometry and good/bad percentages
//! - Debouncing slouch alerts to one per breach episode

pub mod alert;
pub mod poller;
pub mod source;
pub mod store;
pub mod timeline;
pub mod types;

pub use alert::{AlertDebouncer, AlertEvent, AlertPhase, AlertState};
pub use poller::{Poller, PollerStats};
pub use source::{HttpTelemetrySource, TelemetrySource};
pub use store::{TelemetrySnapshot, TelemetryStore};
pub use timeline::{DailyReport, PostureStats, Timeline, TimelineAggregator, TimelineMode};
pub use types::{AngleReading, DailyAggregate, Sample};
