//! Spatial result cache and the search service built on it.
//!
//! Completed crawls are stored as keyed JSON blobs and recorded in a search
//! index so later searches for the same term near the same place are served
//! without touching the provider.

pub mod index;
pub mod service;
pub mod store;

use thiserror::Error;

pub use index::{lng_tolerance, within_tolerance, SearchIndex};
pub use service::{CacheSettings, ScoreReference, SearchOptions, SearchOutcome, SearchService};
pub use store::{BlobStore, FsBlobStore, MemoryBlobStore};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("blob already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid blob key \"{key}\": {reason}")]
    InvalidKey { key: String, reason: &'static str },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
