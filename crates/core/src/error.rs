//! Error types for s3-segregator
//!
//! Per-object problems (no date match, failed copy, partial move) are not
//! errors: they are recorded as outcomes and the run continues. Only the
//! variants below ever cross a module boundary as `Err`.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by configuration, paths and the object store
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing configuration, detected before any store access
    #[error("Configuration error: {0}")]
    Config(String),

    /// A remote path could not be parsed
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Transport-level failure talking to the store
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials rejected by the store
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Bucket or key does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Listing failed after the store client's retry policy was exhausted
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
