//! # Posture Telemetry Library
//!
//! Live telemetry client for a wearable posture sensor.
//!
//! This library polls the sensor's angle service, keeps a reconciled live view
//! (current angle, good/bad percentages, daily timeline geometry), raises
//! debounced slouch alerts, and supplies the swipe debounce policy used by the
//! report screens.

pub mod config;
pub mod context;
pub mod error;
pub mod gesture;
pub mod profile;
pub mod telemetry;
