//! Error types for docqa.
//!
//! Library crates use [`DocqaError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all docqa operations.
#[derive(Debug, thiserror::Error)]
pub enum DocqaError {
    /// Configuration loading/validation error, or an operation invoked
    /// before the pipeline was configured.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during crawl or page extraction. Fatal to the
    /// enclosing job; fetches are not retried.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Embedding or completion collaborator returned malformed or absent data.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// A background job was requested while another is still running.
    /// Informational, not fatal.
    #[error("a {job} job is already running")]
    AlreadyRunning { job: String },

    /// Vector index error (dimension mismatch, corrupt blob, or a
    /// manifest/index row-count mismatch).
    #[error("index error: {0}")]
    Index(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad payload, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocqaError>;

impl DocqaError {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DocqaError::config("site base_url is not set");
        assert_eq!(err.to_string(), "config error: site base_url is not set");

        let err = DocqaError::Index("dimension mismatch: 384 vs 256".into());
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[test]
    fn already_running_is_informational() {
        let err = DocqaError::AlreadyRunning {
            job: "rebuild".into(),
        };
        assert_eq!(err.to_string(), "a rebuild job is already running");
    }
}
