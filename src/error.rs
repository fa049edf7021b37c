//! Error types for the imager core

use std::io;
use std::path::Path;

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T, E = FlashError> = std::result::Result<T, E>;

/// Errors raised while discovering, downloading or flashing images
#[derive(Error, Debug)]
pub enum FlashError {
    /// Missing or unusable selection; raised before any side effect
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Another flash session is still running
    #[error("A flash is already in progress; wait for it to finish")]
    SessionBusy,

    /// Network-level failure or timeout
    #[error("Transfer failed: {cause}")]
    Transfer { cause: String },

    /// Terminal non-2xx HTTP response
    #[error("HTTP {code}: {message}")]
    HttpStatus { code: u16, message: String },

    #[error("Too many redirects (limit is {max})")]
    TooManyRedirects { max: usize },

    /// Device listing command could not run or be read
    #[error("Device enumeration failed: {0}")]
    Enumeration(String),

    /// Writer process exited with a non-zero code
    #[error("Flash process failed with exit code {code}")]
    WriteExit { code: i32 },

    /// Writer process ended without an exit code (killed by a signal)
    #[error("Flash process failed: terminated without an exit code")]
    WriteTerminated,

    /// Writer process could not be started
    #[error("Failed to start flash process: {cause}")]
    WriteSpawn { cause: String },

    #[error("SHA256 mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Unsupported operating system: {0}")]
    UnsupportedPlatform(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl FlashError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        FlashError::InvalidRequest(msg.into())
    }

    pub fn transfer(cause: impl ToString) -> Self {
        FlashError::Transfer {
            cause: cause.to_string(),
        }
    }

    pub fn io_at(action: &str, path: &Path, source: io::Error) -> Self {
        FlashError::Io {
            context: format!("Failed to {} {}", action, path.display()),
            source,
        }
    }

    /// Whether the error came out of the writer subprocess
    pub fn is_write_error(&self) -> bool {
        matches!(
            self,
            FlashError::WriteExit { .. } | FlashError::WriteTerminated | FlashError::WriteSpawn { .. }
        )
    }
}

impl From<reqwest::Error> for FlashError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FlashError::transfer(format!("Request timeout: {}", err))
        } else {
            FlashError::transfer(err)
        }
    }
}
