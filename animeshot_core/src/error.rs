//! Error types for the animeshot core library
//!
//! Errors are grouped by the external boundary that produced them, so callers
//! can apply the failure policy for that boundary without inspecting messages.

use thiserror::Error;

pub mod persistence;
pub mod recognition;
pub mod storage;
pub mod validation;

pub use self::persistence::PersistenceError;
pub use self::recognition::RecognitionError;
pub use self::storage::StorageError;
pub use self::validation::ValidationError;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the animeshot core library
///
/// - Recognition errors: the visual search and title lookup services
/// - Storage errors: listing, downloading and renaming files
/// - Persistence errors: reading and writing image records
/// - Validation errors: configuration and state-machine violations
#[derive(Error, Debug)]
pub enum Error {
    /// Recognition related errors
    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    /// Storage related errors
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Persistence related errors
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Validation related errors
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Error {
    /// Check if this error is transient and the operation can be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Recognition(e) => e.is_transient(),
            Self::Storage(e) => e.is_transient(),
            Self::Persistence(e) => e.is_transient(),
            Self::Validation(_) => false,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Storage(StorageError::io(source))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(PersistenceError::serialization(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;
    use std::io;
    use std::time::Duration;

    #[test]
    fn test_rate_limited_is_transient() {
        let error = Error::Recognition(RecognitionError::rate_limited(Some(Duration::from_secs(5))));
        assert!(error.is_transient());
        assert!(error.to_string().contains("Rate limited"));
    }

    #[test]
    fn test_quota_exceeded_is_not_transient() {
        let error = Error::Recognition(RecognitionError::QuotaExceeded);
        assert!(!error.is_transient());
    }

    #[test]
    fn test_storage_server_error_is_transient() {
        let error = Error::Storage(StorageError::api("rename", 503, "backend error"));
        assert!(error.is_transient());
        assert!(error.to_string().contains("rename"));
        assert!(error.to_string().contains("503"));
    }

    #[test]
    fn test_validation_errors_are_never_transient() {
        let error = Error::Validation(ValidationError::missing_setting("storage.folder_id"));
        assert!(!error.is_transient());
        assert!(error.to_string().contains("storage.folder_id"));
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "missing");
        let error: Error = io_error.into();

        assert!(matches!(error, Error::Storage(StorageError::Io { .. })));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: Error = err.into();
        assert!(matches!(
            error,
            Error::Persistence(PersistenceError::Serialization { .. })
        ));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_error_display_formatting() {
        let errors = vec![
            Error::Recognition(RecognitionError::unavailable(3, "quota exhausted")),
            Error::Storage(StorageError::not_found("abc")),
            Error::Persistence(PersistenceError::exhausted("abc", 3, "timeout")),
            Error::Validation(ValidationError::invalid_configuration("bad")),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }
}
