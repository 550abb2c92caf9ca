use animeshot_core::Error as CoreError;
use animeshot_core::error::{PersistenceError, RecognitionError, StorageError};
use colored::*;
use std::error::Error as StdError;
use std::fmt;
use std::io;

/// CLI-specific error type with semantic exit codes
#[derive(Debug)]
pub struct CliError {
    /// The main error message
    message: String,

    /// Error category for exit code determination
    category: ErrorCategory,

    /// Additional context information
    context: Vec<(String, String)>,

    /// Suggestions for recovery
    pub suggestions: Vec<String>,

    /// Source error if any
    source: Option<Box<dyn StdError + Send + Sync>>,
}

/// Error categories that map to exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorCategory {
    General,
    Configuration,
    Network,
    PersistenceAbort,
    ToleranceExceeded,
}

/// Semantic exit codes for the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    Configuration = 2,
    NetworkError = 3,
    PersistenceAbort = 4,
    ToleranceExceeded = 5,
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Extension trait for adding context to errors
pub trait ErrorContext {
    fn with_context(self, key: &str, value: &str) -> Self;
    fn with_suggestion(self, suggestion: &str) -> Self;
    fn with_source(self, source: Box<dyn StdError + Send + Sync>) -> Self;
}

impl CliError {
    fn with_category(message: &str, category: ErrorCategory) -> Self {
        Self {
            message: message.to_string(),
            category,
            context: Vec::new(),
            suggestions: Vec::new(),
            source: None,
        }
    }

    /// Create a general error
    pub fn general(message: &str) -> Self {
        Self::with_category(message, ErrorCategory::General)
    }

    /// Create a configuration or usage error
    pub fn configuration(message: &str) -> Self {
        let mut error = Self::with_category(message, ErrorCategory::Configuration);
        error
            .suggestions
            .push("Run 'animeshot config init' to create a configuration".to_string());
        error
            .suggestions
            .push("Run 'animeshot config list' to inspect the effective values".to_string());
        error
    }

    /// Create a network or external service error
    pub fn network(message: &str) -> Self {
        let mut error = Self::with_category(message, ErrorCategory::Network);
        error
            .suggestions
            .push("Check your internet connection".to_string());
        error.suggestions.push("Try again later".to_string());
        error
    }

    /// Create the error for a run stopped by a record write that could not be retried
    pub fn persistence_abort(message: &str) -> Self {
        let mut error = Self::with_category(message, ErrorCategory::PersistenceAbort);
        error
            .suggestions
            .push("Check the database URL and credentials".to_string());
        error
            .suggestions
            .push("Re-run with --resume once the database is reachable".to_string());
        error
    }

    /// Create the error for a run with more failed items than allowed
    pub fn tolerance_exceeded(failed: usize, tolerance: usize) -> Self {
        let mut error = Self::with_category(
            &format!("{failed} item(s) failed, tolerance is {tolerance}"),
            ErrorCategory::ToleranceExceeded,
        );
        error
            .suggestions
            .push("Re-run with --rescan-failed to retry the failed items".to_string());
        error
    }

    /// Create an error from an IO error
    pub fn from_io_error(error: io::Error, path: &str) -> Self {
        let message = format!("IO error on '{path}': {error}");
        let mut cli_error = match error.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::UnexpectedEof => Self::network(&message),
            _ => Self::general(&message),
        };

        cli_error.source = Some(Box::new(error));
        cli_error
            .context
            .push(("path".to_string(), path.to_string()));
        cli_error
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self.category {
            ErrorCategory::General => ExitCode::GeneralError,
            ErrorCategory::Configuration => ExitCode::Configuration,
            ErrorCategory::Network => ExitCode::NetworkError,
            ErrorCategory::PersistenceAbort => ExitCode::PersistenceAbort,
            ErrorCategory::ToleranceExceeded => ExitCode::ToleranceExceeded,
        }
    }

    fn label(&self) -> &'static str {
        match self.category {
            ErrorCategory::General => "Error",
            ErrorCategory::Configuration => "Configuration Error",
            ErrorCategory::Network => "Network Error",
            ErrorCategory::PersistenceAbort => "Run Aborted",
            ErrorCategory::ToleranceExceeded => "Run Failed",
        }
    }

    /// Format the error for user display
    pub fn format_for_user(&self, debug: bool) -> String {
        let mut output = String::new();

        let prefix = match self.category {
            ErrorCategory::Configuration => self.label().yellow(),
            _ => self.label().red(),
        };

        output.push_str(&format!("{}: {}\n", prefix, self.message));

        if !self.context.is_empty() {
            output.push_str("\nContext:\n");
            for (key, value) in &self.context {
                output.push_str(&format!("  {}: {}\n", key.bold(), value));
            }
        }

        if debug && let Some(source) = &self.source {
            output.push_str("\nCaused by:\n");
            let mut current: Option<&dyn StdError> = Some(source.as_ref());
            let mut level = 1;

            while let Some(err) = current {
                output.push_str(&format!("  {level}: {err}\n"));
                current = err.source();
                level += 1;
            }
        }

        if !self.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in &self.suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label(), self.message)?;

        for (key, value) in &self.context {
            write!(f, " ({key}: {value})")?;
        }

        Ok(())
    }
}

impl StdError for CliError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl ErrorContext for CliError {
    fn with_context(mut self, key: &str, value: &str) -> Self {
        self.context.push((key.to_string(), value.to_string()));
        self
    }

    fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.suggestions.push(suggestion.to_string());
        self
    }

    fn with_source(mut self, source: Box<dyn StdError + Send + Sync>) -> Self {
        self.source = Some(source);
        self
    }
}

/// Map core errors to the exit code of the boundary that failed
impl From<CoreError> for CliError {
    fn from(error: CoreError) -> Self {
        let message = error.to_string();
        let cli_error = match &error {
            CoreError::Validation(_) => Self::configuration(&message),
            CoreError::Persistence(PersistenceError::Exhausted { .. }) => {
                Self::persistence_abort(&message)
            }
            CoreError::Persistence(PersistenceError::Unauthorized { .. })
            | CoreError::Storage(StorageError::Unauthorized { .. }) => {
                Self::configuration(&message)
            }
            CoreError::Storage(StorageError::Io { .. }) => Self::general(&message),
            CoreError::Recognition(RecognitionError::QuotaExceeded) => Self::network(&message)
                .with_suggestion("Configure a trace.moe API key for a higher quota"),
            CoreError::Storage(StorageError::NotFound { .. })
            | CoreError::Storage(StorageError::NotAFolder { .. }) => Self::configuration(&message)
                .with_suggestion("Run 'animeshot folders' to list accessible folders"),
            _ => Self::network(&message),
        };
        cli_error.with_source(Box::new(error))
    }
}

/// Convert anyhow errors to CLI errors
impl From<anyhow::Error> for CliError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<CoreError>() {
            Ok(core) => core.into(),
            Err(error) => Self::general(&format!("{error:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animeshot_core::error::ValidationError;

    #[test]
    fn test_exit_codes_follow_categories() {
        assert_eq!(CliError::general("x").exit_code() as i32, 1);
        assert_eq!(CliError::configuration("x").exit_code() as i32, 2);
        assert_eq!(CliError::network("x").exit_code() as i32, 3);
        assert_eq!(CliError::persistence_abort("x").exit_code() as i32, 4);
        assert_eq!(CliError::tolerance_exceeded(3, 0).exit_code() as i32, 5);
    }

    #[test]
    fn test_core_errors_map_to_exit_codes() {
        let abort: CliError = CoreError::from(PersistenceError::exhausted("id", 3, "down")).into();
        assert_eq!(abort.exit_code(), ExitCode::PersistenceAbort);

        let config: CliError =
            CoreError::from(ValidationError::missing_setting("storage.folder_id")).into();
        assert_eq!(config.exit_code(), ExitCode::Configuration);

        let network: CliError = CoreError::from(StorageError::api("list", 503, "busy")).into();
        assert_eq!(network.exit_code(), ExitCode::NetworkError);
    }

    #[test]
    fn test_anyhow_wrapping_keeps_core_category() {
        let error = anyhow::Error::from(CoreError::from(PersistenceError::exhausted(
            "id", 3, "down",
        )));
        let cli: CliError = error.into();
        assert_eq!(cli.exit_code(), ExitCode::PersistenceAbort);
    }

    #[test]
    fn test_format_for_user_includes_context_and_suggestions() {
        let error = CliError::general("boom").with_context("folder", "abc");
        let output = error.format_for_user(false);
        assert!(output.contains("boom"));
        assert!(output.contains("folder"));

        let error = CliError::tolerance_exceeded(2, 1);
        assert!(error.format_for_user(false).contains("--rescan-failed"));
    }
}
