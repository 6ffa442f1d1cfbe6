//! Common error types for newslens
//!
//! The taxonomy mirrors how callers are expected to react:
//! - `Transient`: network or availability trouble, safe to retry
//! - `Validation`: rejected locally, never reaches the remote store
//! - `Conflict`: the remote store refused the write (permissions, missing target)

use thiserror::Error;

/// Common result type for newslens operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across newslens crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input rejected before any remote call
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Remote store or service temporarily unavailable
    #[error("Transient remote failure: {0}")]
    Transient(String),

    /// Remote store rejected the write (permission or referential integrity)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when retrying the same operation may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transient(_) => true,
            #[cfg(feature = "sqlx")]
            Error::Database(db_err) => db_err.to_string().contains("database is locked"),
            _ => false,
        }
    }

    /// True when the remote store refused the write
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// True for locally rejected input
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
