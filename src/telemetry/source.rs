//! # Telemetry Source
//!
//! Trait abstraction over the remote angle service, plus the HTTP
//! implementation used in production.
//!
//! Endpoints (all pull-only):
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | GET | `/current-angle` | `{ "angle": 97.4 }` |
//! | GET | `/today-data` | `{ "timeline": [{ "time": "09:15:02", "slouched": true }], "good_posture": 80.0, "bad_posture": 20.0 }` |
//! | GET | `/users/{id}` | `{ "name": "..", "email": "..", "profile_pic": "me.png" }` |

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{CurrentAngleResponse, DailyAggregate, TodayDataResponse};
use crate::config::ServerConfig;
use crate::error::{PostureError, Result};
use crate::profile::{UserProfile, UserResponse};

/// Read access to the remote telemetry service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Instantaneous spine angle in degrees
    async fn current_angle(&self) -> Result<f64>;

    /// Today's sample timeline
    async fn today(&self) -> Result<DailyAggregate>;

    /// Profile record for `user_id`
    async fn user_profile(&self, user_id: &str) -> Result<UserProfile>;
}

/// `TelemetrySource` backed by the server's JSON API
#[derive(Debug, Clone)]
pub struct HttpTelemetrySource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTelemetrySource {
    /// Build a client for `config.base_url`
    ///
    /// # Errors
    ///
    /// Returns `PostureError::Network` if the HTTP client cannot be built
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use posture_telemetry::config::Config;
    /// use posture_telemetry::telemetry::source::HttpTelemetrySource;
    ///
    /// let source = HttpTelemetrySource::new(&Config::default().server)?;
    /// assert_eq!(source.base_url(), "http://127.0.0.1:5000");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PostureError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        debug!("GET {} -> {} bytes", url, body.len());
        decode_body(&body)
    }
}

fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    Ok(serde_json::from_str(body)?)
}

/// Extract the angle, rejecting a missing or non-finite value
fn angle_from(body: CurrentAngleResponse) -> Result<f64> {
    match body.angle {
        Some(angle) if angle.is_finite() => Ok(angle),
        Some(angle) => Err(PostureError::MalformedResponse(format!(
            "angle is not finite: {}",
            angle
        ))),
        None => Err(PostureError::MalformedResponse(
            "missing 'angle' field".to_string(),
        )),
    }
}

#[async_trait]
impl TelemetrySource for HttpTelemetrySource {
    async fn current_angle(&self) -> Result<f64> {
        let body: CurrentAngleResponse = self.get_json("/current-angle").await?;
        angle_from(body)
    }

    async fn today(&self) -> Result<DailyAggregate> {
        let body: TodayDataResponse = self.get_json("/today-data").await?;
        Ok(body.into())
    }

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile> {
        let body: UserResponse = self.get_json(&format!("/users/{}", user_id)).await?;
        Ok(UserProfile::from_response(user_id, body, &self.base_url))
    }
}
