use std::path::PathBuf;

use thiserror::Error;
use timeline::TimelineError;

mod backend;
pub use backend::SlotBackend;
mod fs_backend;
pub use fs_backend::FsBackend;
mod sqlite_backend;
pub use sqlite_backend::SqliteBackend;
mod versioned;
pub use versioned::*;
pub mod config;
pub use config::{BackendKind, StoreConfig};
mod engine;
pub use engine::*;

pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir);
    base.join("barline")
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a record for {0} already exists, update it instead")]
    Conflict(String),
    #[error("no record for {0}, create it first")]
    NotFound(String),
    #[error("invalid slot id: {0:?}")]
    InvalidSlotId(String),
    #[error("backup numbers for {0} are exhausted")]
    BackupLimit(String),
    #[error("no duration known for track {0}")]
    UnknownTrack(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("malformed record: {0}")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

pub type StoreResult<T> = Result<T, StoreError>;
