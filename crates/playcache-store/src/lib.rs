//! Local store for playcache
//!
//! Provides:
//! - One logical collection per record kind, looked up by owner
//! - Dirty tracking (pending/synced) with per-record attempt bookkeeping
//! - Upserted profile records with version-based staleness
//! - A degraded store used when the database cannot be opened

mod sqlite;
mod traits;
mod unavailable;

pub use sqlite::*;
pub use traits::*;
pub use unavailable::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store failed to initialize or is otherwise unusable
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

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

pub type StoreResult<T> = Result<T, StoreError>;
