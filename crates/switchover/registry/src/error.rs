//! Registry error types

use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode {resource} response: {reason}")]
    Decode { resource: String, reason: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
