//! Recognition related error types

use std::time::Duration;
use thiserror::Error;

/// Errors raised while identifying a screenshot
#[derive(Error, Debug)]
pub enum RecognitionError {
    /// The service asked us to slow down
    #[error("Rate limited by recognition service{}", format_retry_after(*retry_after))]
    RateLimited { retry_after: Option<Duration> },

    /// The account quota for the search API is used up
    #[error("Recognition quota exhausted")]
    QuotaExceeded,

    /// The service answered with an error status
    #[error("Recognition API error: {code} - {message}")]
    ServerError { code: u16, message: String },

    /// The request never reached the service or the connection dropped
    #[error("Recognition network error: {message}")]
    Network { message: String },

    /// The response body could not be understood
    #[error("Invalid recognition response: {message}")]
    InvalidResponse { message: String },

    /// Recognition gave up after the retry budget was spent
    #[error("Recognition unavailable after {attempts} attempt(s): {reason}")]
    Unavailable { attempts: u32, reason: String },
}

fn format_retry_after(retry_after: Option<Duration>) -> String {
    match retry_after {
        Some(delay) => format!(" (retry after {}s)", delay.as_secs()),
        None => String::new(),
    }
}

impl RecognitionError {
    /// Create a rate limit error
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Create a server error with code and message
    pub fn server_error(code: u16, message: &str) -> Self {
        Self::ServerError {
            code,
            message: message.to_string(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Create the terminal "unavailable" error
    pub fn unavailable(attempts: u32, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            attempts,
            reason: reason.into(),
        }
    }

    /// Check if this error is transient and can be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network { .. } => true,
            Self::ServerError { code, .. } => matches!(code, 500..=599),
            Self::QuotaExceeded | Self::InvalidResponse { .. } | Self::Unavailable { .. } => false,
        }
    }

    /// Delay requested by the service, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
