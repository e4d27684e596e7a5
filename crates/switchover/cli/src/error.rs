//! CLI error types

use std::process::ExitCode;
use switchover_migration::MigrationError;
use switchover_registry::RegistryError;
use thiserror::Error;

/// CLI error types
#[derive(Debug, Error)]
pub enum CliError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or conflicting options
    #[error("{0}")]
    Usage(String),

    /// API error response
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML rendering error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Registry error outside a per-device outcome
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Migration error outside a per-device outcome
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

impl CliError {
    /// Process exit code for this error
    ///
    /// `2` is reserved for usage errors and `3` for configuration and local
    /// file problems; everything that went wrong talking to the registry is
    /// `1`.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Usage(_) => ExitCode::from(2),
            CliError::Config(_) | CliError::Io(_) | CliError::Json(_) | CliError::Yaml(_) => {
                ExitCode::from(3)
            }
            _ => ExitCode::FAILURE,
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
