//! CLI Error Types

use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Input export could not be read
    #[error("Invalid input {path}: {message}")]
    InputError { path: String, message: String },

    /// File I/O error
    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Advisor client error
    #[error("Advisor error: {0}")]
    AdvisorError(#[from] meal_scoring::AdvisorError),

    /// Store error
    #[error("Store error: {0}")]
    StoreError(#[from] meal_store::StoreError),
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        CliError::ConfigError {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_arg(message: impl Into<String>) -> Self {
        CliError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an input error
    pub fn input(path: impl Into<String>, message: impl Into<String>) -> Self {
        CliError::InputError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ConfigError { .. } => 1,
            CliError::InvalidArgument { .. } => 2,
            CliError::InputError { .. } => 3,
            CliError::IoError(_) => 5,
            CliError::JsonError(_) => 6,
            CliError::AdvisorError(_) => 10,
            CliError::StoreError(_) => 11,
        }
    }
}
