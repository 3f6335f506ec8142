//! # Error Types
//!
//! Custom error types for the posture telemetry client using `thiserror`.
//!
//! None of these are fatal inside the polling core: network and response
//! errors skip a single tick, and sample parse errors exclude a single sample.

use thiserror::Error;

/// Main error type for the posture telemetry client
#[derive(Debug, Error)]
pub enum PostureError {
    /// The request could not complete (connect, timeout, body read)
    #[error("Network failure: {0}")]
    Network(String),

    /// The server answered with a non-2xx status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Response status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Body is not valid JSON or is missing expected fields
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A sample's time-of-day string could not be parsed
    #[error("Invalid sample time: {0:?}")]
    ParseFailure(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for PostureError {
    fn from(err: reqwest::Error) -> Self {
        PostureError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for PostureError {
    fn from(err: serde_json::Error) -> Self {
        PostureError::MalformedResponse(err.to_string())
    }
}

/// Result type alias for the posture telemetry client
pub type Result<T> = std::result::Result<T, PostureError>;
