use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{app_data_dir, FsBackend, SlotBackend, SqliteBackend, StoreResult, VersionedStore};

/// Database file used by [`BackendKind::Sqlite`] inside the store root.
pub const SQLITE_FILE: &str = "slots.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// One JSON file per slot name.
    Fs,
    Sqlite,
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::Fs
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fs" | "file" | "files" => Ok(Self::Fs),
            "sqlite" | "db" => Ok(Self::Sqlite),
            other => Err(format!("unknown backend '{other}' (expected fs or sqlite)")),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fs => f.write_str("fs"),
            Self::Sqlite => f.write_str("sqlite"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub backend: BackendKind,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: app_data_dir().join("markers"),
            backend: BackendKind::default(),
        }
    }
}

impl StoreConfig {
    pub fn new(root: impl Into<PathBuf>, backend: BackendKind) -> Self {
        Self {
            root: root.into(),
            backend,
        }
    }

    pub fn open(&self) -> StoreResult<VersionedStore<Box<dyn SlotBackend>>> {
        debug!(root = %self.root.display(), backend = %self.backend, "opening store");
        let backend: Box<dyn SlotBackend> = match self.backend {
            BackendKind::Fs => Box::new(FsBackend::open(&self.root)?),
            BackendKind::Sqlite => {
                Box::new(SqliteBackend::open_or_create(&self.root.join(SQLITE_FILE))?)
            }
        };
        Ok(VersionedStore::new(backend))
    }
}
