//! Common error types for the MES services

use thiserror::Error;

/// Common result type for MES operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across MES services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Failure reason lookup failed (remote label service or lookup table)
    #[error("Enrichment error: {0}")]
    Enrichment(String),
}
