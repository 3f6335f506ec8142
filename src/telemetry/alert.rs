//! # Alert Debouncer
//!
//! Two-state machine that turns a stream of angle readings into at most one
//! alert per breach episode.
//!
//! | From | Reading | To | Side effect |
//! |------|---------|----|-------------|
//! | Quiet | `angle > threshold` | Alerted | alert raised |
//! | Alerted | `angle > threshold` | Alerted | none |
//! | Alerted | `angle <= threshold` | Quiet | none (re-armed) |
//! | Quiet | `angle <= threshold` | Quiet | none |

use chrono::{DateTime, Utc};

use super::types::AngleReading;

/// Debouncer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertPhase {
    /// Armed; the next breach raises an alert
    #[default]
    Quiet,
    /// Inside a breach episode; further breaches are suppressed
    Alerted,
}

/// Alert raised on a `Quiet -> Alerted` transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertEvent {
    pub angle_degrees: f64,
    pub threshold_degrees: f64,
    pub raised_at: DateTime<Utc>,
}

/// Public view of the debouncer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AlertState {
    pub last_alert_at: Option<DateTime<Utc>>,
    /// True while a breach episode is in progress
    pub suppressed: bool,
}

#[derive(Debug, Clone)]
pub struct AlertDebouncer {
    threshold_degrees: f64,
    phase: AlertPhase,
    last_alert_at: Option<DateTime<Utc>>,
}

impl AlertDebouncer {
    pub fn new(threshold_degrees: f64) -> Self {
        Self {
            threshold_degrees,
            phase: AlertPhase::Quiet,
            last_alert_at: None,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold_degrees
    }

    pub fn phase(&self) -> AlertPhase {
        self.phase
    }

    pub fn state(&self) -> AlertState {
        AlertState {
            last_alert_at: self.last_alert_at,
            suppressed: self.phase == AlertPhase::Alerted,
        }
    }

    /// Whether `angle_degrees` breaches the threshold
    pub fn is_breach(&self, angle_degrees: f64) -> bool {
        angle_degrees > self.threshold_degrees
    }

    /// Feed one reading; returns an event only on `Quiet -> Alerted`.
    pub fn observe(&mut self, reading: &AngleReading) -> Option<AlertEvent> {
        let breach = self.is_breach(reading.angle_degrees);

        match (self.phase, breach) {
            (AlertPhase::Quiet, true) => {
                self.phase = AlertPhase::Alerted;
                self.last_alert_at = Some(reading.observed_at);
                Some(AlertEvent {
                    angle_degrees: reading.angle_degrees,
                    threshold_degrees: self.threshold_degrees,
                    raised_at: reading.observed_at,
                })
            }
            (AlertPhase::Alerted, false) => {
                self.phase = AlertPhase::Quiet;
                None
            }
            _ => None,
        }
    }
}
