//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Visreg library error
    #[error("{0}")]
    Visreg(#[from] visreg::VisregError),

    /// Desktop window error
    #[error("GUI error: {message}")]
    Gui {
        /// Error message
        message: String,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a GUI error
    #[must_use]
    pub fn gui(message: impl Into<String>) -> Self {
        Self::Gui {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config("VISREG_KEEP is not a number");
        assert!(err.to_string().contains("Configuration"));
        assert!(err.to_string().contains("VISREG_KEEP"));
    }

    #[test]
    fn test_invalid_argument_error() {
        let err = CliError::invalid_argument("bad field");
        assert!(err.to_string().contains("Invalid argument"));
    }

    #[test]
    fn test_gui_error() {
        assert!(CliError::gui("no display").to_string().contains("GUI"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(cli_err.to_string().contains("I/O"));
    }

    #[test]
    fn test_visreg_error_passes_message_through() {
        let err: CliError = visreg::VisregError::InvalidInput {
            message: "unknown scenario".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Invalid input: unknown scenario");
    }
}
