//! # Timeline Aggregator
//!
//! Turns the day's posture samples into track geometry and good/bad
//! percentages.
//!
//! ## Geometry
//!
//! Each sample's `HH:MM` time is converted to a minute of the day and placed
//! along a horizontal track:
//!
//! `offset = minute_of_day / total_minutes * track_width`
//!
//! - **Bucketed** mode emits one background bucket per sample, each
//!   `track_width / sample_count` wide, plus a thin mark on top of every
//!   slouched sample.
//! - **Filtered** mode drops good samples first, so good periods render as
//!   empty track.
//!
//! ## Percentages
//!
//! `total = max(good + bad, 1)`, `bad% = 100 * bad / total`, `good% = 100 - bad%`.
//! An empty day is 100% good.
//!
//! Samples whose time cannot be parsed, or that fall past the end of a
//! shortened track, are excluded from both the geometry and the counts.
//!
//! ## Usage
//!
//! ```
//! use posture_telemetry::telemetry::timeline::TimelineAggregator;
//! use posture_telemetry::telemetry::types::Sample;
//!
//! let aggregator = TimelineAggregator::new(1440.0, 2.0, 1440);
//! let report = aggregator.rebuild(&[
//!     Sample::new("06:00", true),
//!     Sample::new("18:00", false),
//! ]);
//!
//! assert_eq!(report.timeline.buckets.len(), 2);
//! assert_eq!(report.timeline.buckets[0].offset, 360.0);
//! assert_eq!(report.stats.bad_percent, 50.0);
//! ```

use chrono::{NaiveTime, Timelike};
use tracing::debug;

use super::types::Sample;
use crate::config::TimelineConfig;
use crate::error::{PostureError, Result};

/// Minutes in a day
pub const TOTAL_DAY_MINUTES: u32 = 1440;

/// How samples are selected before bucketing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineMode {
    /// Every sample gets a bucket, slouched ones also get a mark
    Bucketed,
    /// Only slouched samples are bucketed
    Filtered,
}

/// Background segment for one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineBucket {
    /// Minute of the day, `0..total_minutes`
    pub start_minute: u16,
    /// Bucket width expressed in minutes of the day
    pub width_minutes: f64,
    /// Left edge along the track
    pub offset: f64,
    /// Width along the track
    pub width: f64,
    pub slouched: bool,
}

/// Thin foreground marker for a slouched sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineMark {
    pub start_minute: u16,
    pub offset: f64,
    pub width: f64,
}

/// Track geometry for one rendering mode
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub mode: TimelineMode,
    pub buckets: Vec<TimelineBucket>,
    pub marks: Vec<TimelineMark>,
}

impl Timeline {
    pub fn empty(mode: TimelineMode) -> Self {
        Self {
            mode,
            buckets: Vec::new(),
            marks: Vec::new(),
        }
    }
}

/// Good/bad split of the valid samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostureStats {
    pub good_count: usize,
    pub bad_count: usize,
    pub good_percent: f64,
    pub bad_percent: f64,
}

impl Default for PostureStats {
    fn default() -> Self {
        Self::from_counts(0, 0)
    }
}

impl PostureStats {
    /// Percentages from raw counts; an empty day is 100% good.
    #[must_use]
    pub fn from_counts(good_count: usize, bad_count: usize) -> Self {
        let total = (good_count + bad_count).max(1) as f64;
        let bad_percent = 100.0 * bad_count as f64 / total;

        Self {
            good_count,
            bad_count,
            good_percent: 100.0 - bad_percent,
            bad_percent,
        }
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.good_count + self.bad_count
    }
}

/// Everything derived from one day's sample list
#[derive(Debug, Clone, PartialEq)]
pub struct DailyReport {
    pub stats: PostureStats,
    /// All valid samples
    pub timeline: Timeline,
    /// Slouched samples only
    pub slouch_timeline: Timeline,
    /// Raw time strings that failed to parse
    pub excluded: Vec<String>,
}

impl Default for DailyReport {
    fn default() -> Self {
        Self {
            stats: PostureStats::default(),
            timeline: Timeline::empty(TimelineMode::Bucketed),
            slouch_timeline: Timeline::empty(TimelineMode::Filtered),
            excluded: Vec::new(),
        }
    }
}

/// A sample whose time parsed successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ParsedSample {
    minute: u16,
    slouched: bool,
}

/// Parse `HH:MM` (or `HH:MM:SS`, seconds dropped) into a minute of the day.
///
/// # Errors
///
/// Returns `PostureError::ParseFailure` carrying the raw string.
///
/// # Examples
///
/// ```
/// use posture_telemetry::telemetry::timeline::parse_minute_of_day;
///
/// assert_eq!(parse_minute_of_day("09:15").unwrap(), 555);
/// assert_eq!(parse_minute_of_day("23:59:59").unwrap(), 1439);
/// assert!(parse_minute_of_day("bad").is_err());
/// ```
pub fn parse_minute_of_day(time: &str) -> Result<u16> {
    let trimmed = time.trim();
    let parsed = NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| PostureError::ParseFailure(time.to_string()))?;

    Ok((parsed.hour() * 60 + parsed.minute()) as u16)
}

/// Pure sample-to-geometry converter.
///
/// Holds only immutable geometry parameters; the same input always yields the
/// same output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineAggregator {
    track_width: f64,
    mark_width: f64,
    total_minutes: u32,
}

impl Default for TimelineAggregator {
    fn default() -> Self {
        Self::new(320.0, 2.0, TOTAL_DAY_MINUTES)
    }
}

impl TimelineAggregator {
    #[must_use]
    pub fn new(track_width: f64, mark_width: f64, total_minutes: u32) -> Self {
        Self {
            track_width,
            mark_width,
            total_minutes: total_minutes.max(1),
        }
    }

    #[must_use]
    pub fn from_config(config: &TimelineConfig) -> Self {
        Self::new(config.track_width, config.mark_width, config.total_day_minutes)
    }

    #[must_use]
    pub fn track_width(&self) -> f64 {
        self.track_width
    }

    /// Rebuild both timelines and the stats from a raw sample list.
    #[must_use]
    pub fn rebuild(&self, samples: &[Sample]) -> DailyReport {
        let (parsed, excluded) = self.parse_samples(samples);

        let bad_count = parsed.iter().filter(|s| s.slouched).count();
        let stats = PostureStats::from_counts(parsed.len() - bad_count, bad_count);

        DailyReport {
            stats,
            timeline: self.layout(TimelineMode::Bucketed, &parsed),
            slouch_timeline: self.layout(TimelineMode::Filtered, &parsed),
            excluded,
        }
    }

    /// Geometry for one mode, skipping unparsable samples.
    #[must_use]
    pub fn bucket(&self, mode: TimelineMode, samples: &[Sample]) -> Timeline {
        let (parsed, _) = self.parse_samples(samples);
        self.layout(mode, &parsed)
    }

    /// Minute of the day for `time`, rejecting minutes past the end of the track.
    fn minute_on_track(&self, time: &str) -> Result<u16> {
        let minute = parse_minute_of_day(time)?;
        if u32::from(minute) >= self.total_minutes {
            return Err(PostureError::ParseFailure(format!(
                "{} is past the {} minute track",
                time, self.total_minutes
            )));
        }
        Ok(minute)
    }

    /// Split samples into placeable ones and the raw times that were excluded.
    fn parse_samples(&self, samples: &[Sample]) -> (Vec<ParsedSample>, Vec<String>) {
        let mut parsed = Vec::with_capacity(samples.len());
        let mut excluded = Vec::new();

        for sample in samples {
            match self.minute_on_track(&sample.time) {
                Ok(minute) => parsed.push(ParsedSample {
                    minute,
                    slouched: sample.slouched,
                }),
                Err(e) => {
                    debug!("Excluding sample: {}", e);
                    excluded.push(sample.time.clone());
                }
            }
        }

        (parsed, excluded)
    }

    fn layout(&self, mode: TimelineMode, parsed: &[ParsedSample]) -> Timeline {
        let selected: Vec<ParsedSample> = match mode {
            TimelineMode::Bucketed => parsed.to_vec(),
            TimelineMode::Filtered => parsed.iter().copied().filter(|s| s.slouched).collect(),
        };

        if selected.is_empty() {
            return Timeline::empty(mode);
        }

        let count = selected.len() as f64;
        let width = self.track_width / count;
        let width_minutes = self.total_minutes as f64 / count;

        let buckets = selected
            .iter()
            .map(|s| TimelineBucket {
                start_minute: s.minute,
                width_minutes,
                offset: self.offset_of(s.minute),
                width,
                slouched: s.slouched,
            })
            .collect();

        let marks = selected
            .iter()
            .filter(|s| s.slouched)
            .map(|s| TimelineMark {
                start_minute: s.minute,
                offset: self.offset_of(s.minute),
                width: self.mark_width,
            })
            .collect();

        Timeline {
            mode,
            buckets,
            marks,
        }
    }

    #[inline]
    fn offset_of(&self, minute: u16) -> f64 {
        minute as f64 / self.total_minutes as f64 * self.track_width
    }
}
