//! Common error types for trend merge

use thiserror::Error;

/// Common result type for trend merge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the workspace
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV syntax or encoding error (wraps csv::Error)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No cell in the detected time column could be parsed
    #[error("No parseable timestamps in {0}")]
    NoTimestamps(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors caused by the caller's input rather than the service
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::Csv(_) | Error::InvalidInput(_) | Error::NoTimestamps(_)
        )
    }
}
