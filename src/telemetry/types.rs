//! # Telemetry Types
//!
//! Domain values exchanged between the poller, the store and the aggregator,
//! plus the JSON bodies returned by the telemetry server.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// One time-stamped posture classification from the daily timeline.
///
/// `time` is kept exactly as received; it is parsed (and possibly rejected)
/// by the timeline aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Local time of day, `HH:MM` or `HH:MM:SS`
    pub time: String,
    /// Whether posture was classified as bad at that time
    pub slouched: bool,
}

impl Sample {
    pub fn new(time: impl Into<String>, slouched: bool) -> Self {
        Self {
            time: time.into(),
            slouched,
        }
    }
}

/// The latest instantaneous angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleReading {
    pub angle_degrees: f64,
    pub observed_at: DateTime<Utc>,
}

impl AngleReading {
    pub fn new(angle_degrees: f64, observed_at: DateTime<Utc>) -> Self {
        Self {
            angle_degrees,
            observed_at,
        }
    }

    /// Reading observed now
    pub fn now(angle_degrees: f64) -> Self {
        Self::new(angle_degrees, Utc::now())
    }
}

/// The day's sample list as delivered by the server.
///
/// Server-side percentages are carried for comparison only; the store always
/// recomputes them from `samples`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DailyAggregate {
    pub samples: Vec<Sample>,
    pub server_good_percent: Option<f64>,
    pub server_bad_percent: Option<f64>,
}

impl DailyAggregate {
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self {
            samples,
            ..Self::default()
        }
    }
}

/// Body of `GET /current-angle`
#[derive(Debug, Deserialize)]
pub(crate) struct CurrentAngleResponse {
    pub angle: Option<f64>,
}

/// One timeline entry as sent on the wire.
///
/// Decoded loosely so a single bad entry is excluded by the aggregator
/// instead of failing the whole body.
#[derive(Debug, Deserialize)]
pub(crate) struct WireSample {
    #[serde(default)]
    pub time: Value,
    #[serde(default)]
    pub slouched: Value,
}

impl From<WireSample> for Sample {
    fn from(wire: WireSample) -> Self {
        let time = match wire.time {
            Value::String(time) => time,
            // Non-string times keep their JSON text and fail to parse later
            other => other.to_string(),
        };

        Self {
            time,
            slouched: is_truthy(&wire.slouched),
        }
    }
}

/// `false`, `0`, `""` and `null` (or a missing flag) read as good posture
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Body of `GET /today-data`
#[derive(Debug, Deserialize)]
pub(crate) struct TodayDataResponse {
    pub timeline: Vec<WireSample>,
    #[serde(default)]
    pub good_posture: Option<f64>,
    #[serde(default)]
    pub bad_posture: Option<f64>,
}

impl From<TodayDataResponse> for DailyAggregate {
    fn from(body: TodayDataResponse) -> Self {
        Self {
            samples: body.timeline.into_iter().map(Sample::from).collect(),
            server_good_percent: body.good_posture,
            server_bad_percent: body.bad_posture,
        }
    }
}
