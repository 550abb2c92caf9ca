//! Storage related error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the remote (or local) file store
#[derive(Error, Debug)]
pub enum StorageError {
    /// The requested file or folder does not exist or is not visible
    #[error("Not found in storage: {id}")]
    NotFound { id: String },

    /// The folder id points at something that is not a folder
    #[error("'{id}' is not a folder (mime type {mime_type})")]
    NotAFolder { id: String, mime_type: String },

    /// Credentials were rejected
    #[error("Storage access denied during {operation}: {message}")]
    Unauthorized { operation: String, message: String },

    /// The storage API answered with an error status
    #[error("Storage API error during {operation}: {code} - {message}")]
    Api {
        operation: String,
        code: u16,
        message: String,
    },

    /// Transport failure talking to the storage API
    #[error("Storage network error during {operation}: {message}")]
    Network { operation: String, message: String },

    /// The response body could not be understood
    #[error("Invalid storage response: {message}")]
    InvalidResponse { message: String },

    /// Local filesystem failure
    #[error("{}", format_io(path.as_ref(), source))]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },
}

fn format_io(path: Option<&PathBuf>, source: &std::io::Error) -> String {
    match path {
        Some(path) => format!("Storage I/O error on {}: {source}", path.display()),
        None => format!("Storage I/O error: {source}"),
    }
}

impl StorageError {
    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an error for an id that is not a folder
    pub fn not_a_folder(id: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::NotAFolder {
            id: id.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Create an error from an HTTP status returned by the storage API
    pub fn api(operation: &str, code: u16, message: &str) -> Self {
        match code {
            401 | 403 => Self::Unauthorized {
                operation: operation.to_string(),
                message: message.to_string(),
            },
            _ => Self::Api {
                operation: operation.to_string(),
                code,
                message: message.to_string(),
            },
        }
    }

    /// Create a network error
    pub fn network(operation: &str, message: impl Into<String>) -> Self {
        Self::Network {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Create an I/O error without a path
    pub fn io(source: std::io::Error) -> Self {
        Self::Io { path: None, source }
    }

    /// Create an I/O error for a path
    pub fn io_at(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: Some(path.to_path_buf()),
            source,
        }
    }

    /// Check if this error is transient and can be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Api { code, .. } => matches!(code, 429 | 500..=599),
            Self::Io { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}
