//! Unified error types for bridgespoof

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for bridgespoof operations
#[derive(Error, Debug)]
pub enum Error {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Config errors
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config validation failed: {0}")]
    ConfigValidation(String),

    // Input errors
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    // Network configuration errors
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    // Capture subprocess errors
    #[error("Capture process error: {0}")]
    Process(String),

    // Lifecycle errors
    #[error("Illegal lifecycle transition: {0}")]
    Lifecycle(String),

    #[error("Failed to re-launch with elevated privileges: {0}")]
    Elevation(String),
}

impl Error {
    /// Whether this error happened before anything on the host was touched
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidSelection(_)
                | Error::Validation(_)
                | Error::ConfigRead { .. }
                | Error::ConfigParse(_)
                | Error::ConfigValidation(_)
        )
    }
}

/// Result type alias for bridgespoof operations
pub type Result<T> = std::result::Result<T, Error>;
