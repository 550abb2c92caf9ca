//! Persistence related error types

use thiserror::Error;

/// Errors raised by the record database
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Credentials were rejected
    #[error("Database access denied: {message}")]
    Unauthorized { message: String },

    /// The database answered with an error status
    #[error("Database API error: {code} - {message}")]
    Api { code: u16, message: String },

    /// Transport failure talking to the database
    #[error("Database network error: {message}")]
    Network { message: String },

    /// A record could not be encoded or decoded
    #[error("Record serialization error: {message}")]
    Serialization { message: String },

    /// A record write kept failing; the run cannot continue safely
    #[error("Failed to persist record {source_id} after {attempts} attempt(s): {reason}")]
    Exhausted {
        source_id: String,
        attempts: u32,
        reason: String,
    },
}

impl PersistenceError {
    /// Create an error from an HTTP status returned by the database
    pub fn api(code: u16, message: &str) -> Self {
        match code {
            401 | 403 => Self::Unauthorized {
                message: message.to_string(),
            },
            _ => Self::Api {
                code,
                message: message.to_string(),
            },
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create the abort error for a record that could not be written
    pub fn exhausted(source_id: &str, attempts: u32, reason: impl Into<String>) -> Self {
        Self::Exhausted {
            source_id: source_id.to_string(),
            attempts,
            reason: reason.into(),
        }
    }

    /// Check if this error is transient and can be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Api { code, .. } => matches!(code, 429 | 500..=599),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_mapping() {
        assert!(matches!(
            PersistenceError::api(401, "Permission denied"),
            PersistenceError::Unauthorized { .. }
        ));
        assert!(PersistenceError::api(503, "unavailable").is_transient());
        assert!(!PersistenceError::api(400, "bad").is_transient());
    }

    #[test]
    fn test_exhausted_error() {
        let error = PersistenceError::exhausted("file-1", 3, "timeout");
        assert!(!error.is_transient());
        assert!(error.to_string().contains("file-1"));
        assert!(error.to_string().contains("3 attempt(s)"));
    }
}
