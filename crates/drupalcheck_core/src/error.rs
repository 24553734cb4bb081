//! Checker error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while checking a document.
#[derive(Debug, Error)]
pub enum CheckerError {
    /// The checker could not be prepared (e.g. the executable was not found).
    #[error("Unable to create drupal-check linter: {0}")]
    Construction(String),

    /// The document URI does not name a local file.
    #[error("Invalid document URI: {0}")]
    InvalidUri(String),

    /// The analyzer process could not be spawned or driven.
    #[error("Failed to run `{command}`: {reason}")]
    Invocation { command: String, reason: String },

    /// The analyzer did not finish within the allowed time and was killed.
    #[error("`{command}` timed out after {}s and was terminated", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    /// The analyzer reported a fatal error on stderr.
    #[error("drupal-check fatal error: {0}")]
    Fatal(String),

    /// The analyzer failed without producing a report or a recognizable error.
    #[error("An unknown error occurred while executing `{command}`")]
    Execution { command: String },

    /// The analyzer output is not a valid JSON report.
    #[error("Invalid JSON report string: {0}")]
    InvalidOutput(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a construction error.
    pub fn construction(message: impl Into<String>) -> Self {
        Self::Construction(message.into())
    }

    /// Creates an invalid output error.
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }
}
