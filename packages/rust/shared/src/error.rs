//! Error types for recap.
//!
//! Library crates use [`RecapError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all recap operations.
#[derive(Debug, thiserror::Error)]
pub enum RecapError {
    /// Configuration, rule table, or knowledge base defect. Fatal at load time.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transcript file could not be read as a table (e.g. missing columns).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Output validation or serialization error.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A worker task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RecapError>;

impl RecapError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error should abort the whole run rather than one meeting.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::Task(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = RecapError::config("rule 3 has no tag");
        assert_eq!(err.to_string(), "config error: rule 3 has no tag");

        let err = RecapError::parse("missing required columns: text");
        assert!(err.to_string().contains("missing required columns"));
    }

    #[test]
    fn only_config_and_task_errors_are_fatal() {
        assert!(RecapError::config("x").is_fatal());
        assert!(RecapError::Task("panicked".into()).is_fatal());
        assert!(!RecapError::parse("x").is_fatal());
        assert!(!RecapError::validation("x").is_fatal());
    }
}
