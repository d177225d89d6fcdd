use std::io;

use thiserror::Error;

/// Failures inside the recent-listings cache.
///
/// None of these escape the public store operations; they are logged,
/// handed to the optional diagnostics hook, and then swallowed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read '{key}': {source}")]
    Read {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("persisted value is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),

    #[error("failed to serialize recent listings: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("invalid listing: {0}")]
    InvalidListing(String),

    #[error("unsupported storage key '{0}'")]
    InvalidKey(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
