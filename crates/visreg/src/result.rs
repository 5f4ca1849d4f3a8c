//! Result and error types for Visreg.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Visreg operations
pub type VisregResult<T> = Result<T, VisregError>;

/// Errors that can occur in Visreg
#[derive(Debug, Error)]
pub enum VisregError {
    /// A path did not resolve to a readable image
    #[error("Failed to load image {}: {message}", path.display())]
    ImageLoad {
        /// Image path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Image processing error (resizing, encoding, etc.)
    #[error("Image processing failed: {message}")]
    ImageProcessing {
        /// Error message
        message: String,
    },

    /// Required configuration is absent
    #[error("Configuration missing: {message}")]
    ConfigMissing {
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// The remote window or target went away
    #[error("Browser window was closed unexpectedly: {message}")]
    SessionClosed {
        /// Error message
        message: String,
    },

    /// Element did not appear within the bounded wait
    #[error("Timed out after {ms}ms waiting for {what}")]
    ElementTimeout {
        /// What was waited for
        what: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Page script evaluation error
    #[error("Script evaluation failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// Scenario assertion failed
    #[error("Assertion failed: {message}")]
    Assertion {
        /// Error message
        message: String,
    },

    /// Spreadsheet export error
    #[error("Report export failed: {message}")]
    Export {
        /// Error message
        message: String,
    },

    /// Email composition or delivery error
    #[error("Email delivery failed: {message}")]
    Email {
        /// Error message
        message: String,
    },

    /// Invalid input from the caller
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VisregError {
    /// Whether this error means the browser session is gone
    #[must_use]
    pub const fn is_session_closed(&self) -> bool {
        matches!(self, Self::SessionClosed { .. })
    }

    /// Whether this error is a bounded wait running out
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::ElementTimeout { .. })
    }

    pub(crate) fn image_load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::ImageLoad {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn image_processing(message: impl Into<String>) -> Self {
        Self::ImageProcessing {
            message: message.into(),
        }
    }

    pub(crate) fn config_missing(message: impl Into<String>) -> Self {
        Self::ConfigMissing {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_image_load_mentions_path() {
        let err = VisregError::image_load("/tmp/missing.png", "not found");
        let text = err.to_string();
        assert!(text.contains("/tmp/missing.png"));
        assert!(text.contains("not found"));
    }

    #[test]
    fn test_session_closed_classification() {
        let err = VisregError::SessionClosed {
            message: "target gone".to_string(),
        };
        assert!(err.is_session_closed());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_timeout_classification() {
        let err = VisregError::ElementTimeout {
            what: "#type".to_string(),
            ms: 2000,
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("2000ms"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: VisregError = io_err.into();
        assert!(err.to_string().contains("I/O"));
    }
}
