//! Persistence layer for geoalarm
//!
//! Provides:
//! - The zone collection, stored as one versioned document under one key
//! - Audit log (append-only)

mod audit;
mod document;
mod sqlite;
mod traits;

pub use audit::*;
pub use document::*;
pub use sqlite::*;
pub use traits::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Stored zone schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<StoreError> for geoalarm_util::GeoalarmError {
    fn from(e: StoreError) -> Self {
        geoalarm_util::GeoalarmError::store(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
