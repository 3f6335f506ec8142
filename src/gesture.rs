//! # Gesture Module
//!
//! Debounce policy for swipe-driven navigation between the report screens.
//!
//! A released pan gesture navigates only if:
//!
//! 1. its horizontal displacement exceeds `min_displacement` in the screen's
//!    navigation direction, and
//! 2. more than `debounce` has passed since the previously accepted gesture.
//!
//! The policy is a pure function of the gesture and the last accepted time;
//! [`GestureNavigator`] adds the screen bookkeeping on top.
//!
//! ## Usage
//!
//! ```
//! use std::time::{Duration, Instant};
//! use posture_telemetry::gesture::{Gesture, GestureNavigator, GesturePolicy, ReportScreen};
//!
//! let mut nav = GestureNavigator::new(GesturePolicy::default());
//! let t0 = Instant::now();
//!
//! assert_eq!(nav.on_release(Gesture::new(-80.0, t0)), Some(ReportScreen::Timeline));
//! // Same physical swipe reported twice
//! assert_eq!(nav.on_release(Gesture::new(80.0, t0 + Duration::from_millis(100))), None);
//! ```

use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::GestureConfig;

/// Horizontal swipe direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    /// Finger moves right to left (`dx < 0`)
    Left,
    /// Finger moves left to right (`dx > 0`)
    Right,
}

/// A released pan gesture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gesture {
    /// Horizontal displacement in logical units
    pub dx: f64,
    pub at: Instant,
}

impl Gesture {
    pub fn new(dx: f64, at: Instant) -> Self {
        Self { dx, at }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Displacement too small or in the wrong direction
    TooShort,
    /// Within the debounce window of the last accepted gesture
    TooSoon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureDecision {
    Accept,
    Reject(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GesturePolicy {
    debounce: Duration,
    min_displacement: f64,
}

impl Default for GesturePolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), 50.0)
    }
}

impl GesturePolicy {
    #[must_use]
    pub fn new(debounce: Duration, min_displacement: f64) -> Self {
        Self {
            debounce,
            min_displacement: min_displacement.max(0.0),
        }
    }

    #[must_use]
    pub fn from_config(config: &GestureConfig) -> Self {
        Self::new(Duration::from_millis(config.debounce_ms), config.min_displacement)
    }

    /// Decide whether `gesture` should trigger navigation towards `direction`.
    #[must_use]
    pub fn evaluate(
        &self,
        gesture: &Gesture,
        direction: SwipeDirection,
        last_accepted: Option<Instant>,
    ) -> GestureDecision {
        let far_enough = match direction {
            SwipeDirection::Left => gesture.dx < -self.min_displacement,
            SwipeDirection::Right => gesture.dx > self.min_displacement,
        };
        if !far_enough {
            return GestureDecision::Reject(RejectReason::TooShort);
        }

        if let Some(last) = last_accepted {
            if gesture.at.saturating_duration_since(last) <= self.debounce {
                return GestureDecision::Reject(RejectReason::TooSoon);
            }
        }

        GestureDecision::Accept
    }
}

/// Report screens reachable by swiping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportScreen {
    /// Live angle
    Angle,
    /// Daily timeline and percentages
    Timeline,
}

impl ReportScreen {
    /// Swipe direction leaving this screen, and where it leads
    fn exit(self) -> (SwipeDirection, ReportScreen) {
        match self {
            ReportScreen::Angle => (SwipeDirection::Left, ReportScreen::Timeline),
            ReportScreen::Timeline => (SwipeDirection::Right, ReportScreen::Angle),
        }
    }
}

/// Tracks the current screen and last accepted gesture
#[derive(Debug, Clone)]
pub struct GestureNavigator {
    policy: GesturePolicy,
    screen: ReportScreen,
    last_accepted: Option<Instant>,
}

impl GestureNavigator {
    pub fn new(policy: GesturePolicy) -> Self {
        Self {
            policy,
            screen: ReportScreen::Angle,
            last_accepted: None,
        }
    }

    pub fn screen(&self) -> ReportScreen {
        self.screen
    }

    /// Handle a released gesture; returns the new screen when navigation happens.
    pub fn on_release(&mut self, gesture: Gesture) -> Option<ReportScreen> {
        let (direction, target) = self.screen.exit();

        match self.policy.evaluate(&gesture, direction, self.last_accepted) {
            GestureDecision::Accept => {
                self.last_accepted = Some(gesture.at);
                self.screen = target;
                debug!("Swipe {:?} -> {:?}", direction, target);
                Some(target)
            }
            GestureDecision::Reject(reason) => {
                debug!("Swipe ignored ({:?}, dx = {:.1})", reason, gesture.dx);
                None
            }
        }
    }
}
