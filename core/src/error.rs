//! Error types for the EV Tracker client.
//!
//! # Design
//! One flat enum covers every failure an operation can surface. Status codes
//! the caller is expected to react to get dedicated variants: 401/403 become
//! `Authentication`, 429 becomes `RateLimit` carrying the advised delay. All
//! other non-2xx responses land in `Api` with the status and a best-effort
//! message. Transport failures that never produced a status are `Connection`.

use thiserror::Error;

/// Errors returned by `EvTrackerClient` operations.
#[derive(Debug, Error)]
pub enum EvTrackerError {
    /// The server returned 401 or 403.
    #[error("{0}")]
    Authentication(String),

    /// The server returned 429. `retry_after` is the raw `Retry-After` value.
    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimit { retry_after: String },

    /// Any other non-2xx status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The request never produced a response (DNS, refused, TLS, timeout).
    #[error("Connection error: {0}")]
    Connection(#[source] reqwest::Error),

    /// A successful response whose body is not the expected JSON shape.
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    /// The client was configured with a missing or blank setting.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A session payload held a number JSON cannot carry (NaN or infinity).
    /// Raised before any request is sent.
    #[error("invalid session payload: {0}")]
    InvalidPayload(String),
}

pub type Result<T> = std::result::Result<T, EvTrackerError>;

impl EvTrackerError {
    pub fn config<E: std::fmt::Display>(error: E) -> Self {
        Self::Config(error.to_string())
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimit { .. })
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// HTTP status behind the error, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::RateLimit { .. } => Some(429),
            _ => None,
        }
    }

    /// The advised retry delay in seconds, if the server sent a numeric one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimit { retry_after } => retry_after.trim().parse().ok(),
            _ => None,
        }
    }
}
