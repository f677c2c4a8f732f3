//! Shared error type for API requests: network, status, body, and payload-shape cases.

use thiserror::Error;

/// Error raised by the transport or by response decoding.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: could not reach {url}: {source}")]
    Network {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP {status} when calling: {url}")]
    HttpStatus {
        status: u16,
        url: String,
        /// Optional context (e.g. "claim offer", "catalog page 3") for log lines.
        context: Option<String>,
    },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Unexpected response shape from {url}: {message}")]
    UnexpectedShape { url: String, message: String },
}

impl ApiError {
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        ApiError::Network {
            url: url.into(),
            source: Box::new(source),
        }
    }

    pub fn shape(url: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::UnexpectedShape {
            url: url.into(),
            message: message.into(),
        }
    }
}
