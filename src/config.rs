//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{PostureError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub polling: PollingConfig,
    pub alert: AlertConfig,
    pub timeline: TimelineConfig,
    pub gesture: GestureConfig,
    pub logging: LoggingConfig,
}

/// Remote telemetry server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Profile to load at startup, if any
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Poll loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_fast_interval_ms")]
    pub fast_interval_ms: u64,

    #[serde(default = "default_slow_interval_ms")]
    pub slow_interval_ms: u64,
}

/// Slouch alert configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AlertConfig {
    #[serde(default = "default_threshold_degrees")]
    pub threshold_degrees: f64,
}

/// Timeline geometry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TimelineConfig {
    #[serde(default = "default_track_width")]
    pub track_width: f64,

    #[serde(default = "default_mark_width")]
    pub mark_width: f64,

    #[serde(default = "default_total_day_minutes")]
    pub total_day_minutes: u32,
}

/// Swipe gesture configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GestureConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_min_displacement")]
    pub min_displacement: f64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files; console only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
}

// Default value functions
fn default_base_url() -> String { "http://127.0.0.1:5000".to_string() }
fn default_request_timeout_ms() -> u64 { 5000 }

fn default_fast_interval_ms() -> u64 { 1000 }
fn default_slow_interval_ms() -> u64 { 10000 }

fn default_threshold_degrees() -> f64 { 100.0 }

fn default_track_width() -> f64 { 320.0 }
fn default_mark_width() -> f64 { 2.0 }
fn default_total_day_minutes() -> u32 { 1440 }

fn default_debounce_ms() -> u64 { 500 }
fn default_min_displacement() -> f64 { 50.0 }

fn default_log_level() -> String { "info".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                base_url: default_base_url(),
                request_timeout_ms: default_request_timeout_ms(),
                user_id: None,
            },
            polling: PollingConfig {
                fast_interval_ms: default_fast_interval_ms(),
                slow_interval_ms: default_slow_interval_ms(),
            },
            alert: AlertConfig {
                threshold_degrees: default_threshold_degrees(),
            },
            timeline: TimelineConfig {
                track_width: default_track_width(),
                mark_width: default_mark_width(),
                total_day_minutes: default_total_day_minutes(),
            },
            gesture: GestureConfig {
                debounce_ms: default_debounce_ms(),
                min_displacement: default_min_displacement(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                log_dir: None,
            },
        }
    }
}

impl PollingConfig {
    /// Fast (angle) poll period
    pub fn fast_interval(&self) -> Duration {
        Duration::from_millis(self.fast_interval_ms)
    }

    /// Slow (daily aggregate) poll period
    pub fn slow_interval(&self) -> Duration {
        Duration::from_millis(self.slow_interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use posture_telemetry::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if !self.server.base_url.starts_with("http://")
            && !self.server.base_url.starts_with("https://")
        {
            return Err(invalid("base_url must start with http:// or https://"));
        }

        if self.server.request_timeout_ms == 0 || self.server.request_timeout_ms > 60000 {
            return Err(invalid("request_timeout_ms must be between 1 and 60000"));
        }

        if let Some(user_id) = &self.server.user_id {
            if user_id.trim().is_empty() {
                return Err(invalid("user_id cannot be empty when set"));
            }
        }

        if self.polling.fast_interval_ms == 0 || self.polling.fast_interval_ms > 60000 {
            return Err(invalid("fast_interval_ms must be between 1 and 60000"));
        }

        if self.polling.slow_interval_ms == 0 || self.polling.slow_interval_ms > 3_600_000 {
            return Err(invalid("slow_interval_ms must be between 1 and 3600000"));
        }

        if !self.alert.threshold_degrees.is_finite() {
            return Err(invalid("threshold_degrees must be a finite number"));
        }

        if !(self.timeline.track_width > 0.0 && self.timeline.track_width.is_finite()) {
            return Err(invalid("track_width must be greater than 0"));
        }

        if self.timeline.mark_width < 0.0 || self.timeline.mark_width > self.timeline.track_width {
            return Err(invalid("mark_width must be between 0 and track_width"));
        }

        if self.timeline.total_day_minutes == 0 {
            return Err(invalid("total_day_minutes must be greater than 0"));
        }

        if self.gesture.debounce_ms > 10000 {
            return Err(invalid("debounce_ms must be at most 10000"));
        }

        if self.gesture.min_displacement < 0.0 {
            return Err(invalid("min_displacement cannot be negative"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("level must be one of: trace, debug, info, warn, error"));
        }

        if let Some(dir) = &self.logging.log_dir {
            if dir.is_empty() {
                return Err(invalid("log_dir cannot be empty when set"));
            }
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> PostureError {
    PostureError::Config(toml::de::Error::custom(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        tokio_test::assert_ok!(Config::default().validate());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[server]
base_url = "http://192.168.1.22:5000"
user_id = "7"

[polling]
fast_interval_ms = 250

[alert]

[timeline]

[gesture]

[logging]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.server.base_url, "http://192.168.1.22:5000");
        assert_eq!(config.server.user_id.as_deref(), Some("7"));
        assert_eq!(config.polling.fast_interval(), Duration::from_millis(250));
        assert_eq!(config.polling.slow_interval(), Duration::from_millis(10000));
        assert_eq!(config.alert.threshold_degrees, 100.0);
    }

    #[test]
    fn test_load_missing_section_fails() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[server]\n").unwrap();
        temp_file.flush().unwrap();

        assert!(matches!(
            Config::load(temp_file.path()),
            Err(PostureError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = Config::load("/nonexistent/posture.toml");
        assert!(matches!(result, Err(PostureError::Io(_))));
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = Config::default();
        config.server.base_url = "localhost:5000".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_timeout_zero() {
        let mut config = Config::default();
        config.server.request_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_user_id() {
        let mut config = Config::default();
        config.server.user_id = Some("  ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fast_interval_zero() {
        let mut config = Config::default();
        config.polling.fast_interval_ms = 0;
        tokio_test::assert_err!(config.validate());
    }

    #[test]
    fn test_slow_interval_zero() {
        let mut config = Config::default();
        config.polling.slow_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_not_finite() {
        let mut config = Config::default();
        config.alert.threshold_degrees = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_track_width_zero() {
        let mut config = Config::default();
        config.timeline.track_width = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mark_wider_than_track() {
        let mut config = Config::default();
        config.timeline.mark_width = 500.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_total_day_minutes_zero() {
        let mut config = Config::default();
        config.timeline.total_day_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_displacement() {
        let mut config = Config::default();
        config.gesture.min_displacement = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir() {
        let mut config = Config::default();
        config.logging.log_dir = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_base_url(), "http://127.0.0.1:5000");
        assert_eq!(default_request_timeout_ms(), 5000);
        assert_eq!(default_fast_interval_ms(), 1000);
        assert_eq!(default_slow_interval_ms(), 10000);
        assert_eq!(default_threshold_degrees(), 100.0);
        assert_eq!(default_track_width(), 320.0);
        assert_eq!(default_mark_width(), 2.0);
        assert_eq!(default_total_day_minutes(), 1440);
        assert_eq!(default_debounce_ms(), 500);
        assert_eq!(default_min_displacement(), 50.0);
        assert_eq!(default_log_level(), "info");
    }
}
