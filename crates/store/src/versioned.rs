//! Slot protocol: one current record per track id plus numbered backups.
//!
//! The current record of `id` lives under `<id>-markers.json`; every update
//! first renames it to `<id>-markersNN.json` (next free number, two digits)
//! and then writes the new current record. Those are two separate backend
//! calls with no lock around them, so two concurrent updates of the same id
//! can pick the same backup number or interleave their writes.

use timeline::FlatSongRecord;
use tracing::{debug, info, warn};

use crate::{SlotBackend, StoreError, StoreResult};

const MARKERS: &str = "-markers";
const EXTENSION: &str = ".json";

pub fn current_name(id: &str) -> String {
    format!("{id}{MARKERS}{EXTENSION}")
}

pub fn backup_name(id: &str, version: u32) -> String {
    format!("{id}{MARKERS}{version:02}{EXTENSION}")
}

/// Backup number encoded in `name` if it is a backup of `id`.
pub fn parse_backup_version(id: &str, name: &str) -> Option<u32> {
    let digits = name
        .strip_prefix(id)?
        .strip_prefix(MARKERS)?
        .strip_suffix(EXTENSION)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn validate_id(id: &str) -> StoreResult<()> {
    let bad = id.trim().is_empty()
        || id.contains(['/', '\\', '\0'])
        || id.contains("..");
    if bad {
        return Err(StoreError::InvalidSlotId(id.to_string()));
    }
    Ok(())
}

pub struct VersionedStore<B> {
    backend: B,
}

impl<B: SlotBackend> VersionedStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn exists(&self, id: &str) -> StoreResult<bool> {
        validate_id(id)?;
        self.backend.exists(&current_name(id))
    }

    pub fn read_current(&self, id: &str) -> StoreResult<Option<FlatSongRecord>> {
        validate_id(id)?;
        self.read_named(&current_name(id))
    }

    pub fn read_backup(&self, id: &str, version: u32) -> StoreResult<Option<FlatSongRecord>> {
        validate_id(id)?;
        self.read_named(&backup_name(id, version))
    }

    fn read_named(&self, name: &str) -> StoreResult<Option<FlatSongRecord>> {
        match self.backend.get(name)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Writes the first current record of `id`.
    pub fn create(&self, id: &str, record: &FlatSongRecord) -> StoreResult<()> {
        validate_id(id)?;
        let name = current_name(id);
        if self.backend.exists(&name)? {
            return Err(StoreError::Conflict(id.to_string()));
        }
        self.backend.put(&name, &serde_json::to_string_pretty(record)?)?;
        debug!(id, "created record");
        Ok(())
    }

    /// Rotates the current record of `id` into the next backup and writes
    /// `record` as current. Returns the backup number used.
    pub fn update(&self, id: &str, record: &FlatSongRecord) -> StoreResult<u32> {
        validate_id(id)?;
        let name = current_name(id);
        if !self.backend.exists(&name)? {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let contents = serde_json::to_string_pretty(record)?;

        let latest = match self.list_backups(id) {
            Ok(versions) => versions.last().copied().unwrap_or(0),
            Err(e) => {
                warn!(id, error = %e, "could not list backups, numbering from scratch");
                0
            }
        };
        let version = latest
            .checked_add(1)
            .ok_or_else(|| StoreError::BackupLimit(id.to_string()))?;

        self.backend.rename(&name, &backup_name(id, version))?;
        self.backend.put(&name, &contents)?;
        info!(id, backup = version, "updated record");
        Ok(version)
    }

    /// Current record of `id`, creating it from `default_template` first if
    /// the slot is empty.
    pub fn read<F>(&self, id: &str, default_template: F) -> StoreResult<FlatSongRecord>
    where
        F: FnOnce(&str) -> FlatSongRecord,
    {
        if let Some(record) = self.read_current(id)? {
            return Ok(record);
        }
        let record = default_template(id);
        match self.create(id, &record) {
            Ok(()) => Ok(record),
            Err(StoreError::Conflict(_)) => {
                debug!(id, "record appeared concurrently, reading it");
                Ok(self.read_current(id)?.unwrap_or(record))
            }
            Err(e) => Err(e),
        }
    }

    /// Ids that have a current record, sorted.
    pub fn list_ids(&self) -> StoreResult<Vec<String>> {
        let suffix = format!("{MARKERS}{EXTENSION}");
        let mut ids: Vec<String> = self
            .backend
            .list("")?
            .iter()
            .filter_map(|name| name.strip_suffix(suffix.as_str()))
            .filter(|id| validate_id(id).is_ok())
            .map(str::to_string)
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Backup numbers of `id`, ascending.
    pub fn list_backups(&self, id: &str) -> StoreResult<Vec<u32>> {
        validate_id(id)?;
        let mut versions: Vec<u32> = self
            .backend
            .list(&format!("{id}{MARKERS}"))?
            .iter()
            .filter_map(|name| parse_backup_version(id, name))
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_names() {
        assert_eq!(current_name("Amarras"), "Amarras-markers.json");
        assert_eq!(backup_name("Amarras", 1), "Amarras-markers01.json");
        assert_eq!(backup_name("Amarras", 123), "Amarras-markers123.json");
    }

    #[test]
    fn backup_versions_are_parsed_strictly() {
        assert_eq!(parse_backup_version("song", "song-markers07.json"), Some(7));
        assert_eq!(parse_backup_version("song", "song-markers112.json"), Some(112));
        assert_eq!(parse_backup_version("song", "song-markers.json"), None);
        assert_eq!(parse_backup_version("song", "song-markers-old.json"), None);
        assert_eq!(parse_backup_version("song", "other-markers01.json"), None);
        assert_eq!(parse_backup_version("song", "song-markers01.json.bak"), None);
        // A different track whose id merely extends this one.
        assert_eq!(parse_backup_version("song", "song-markers2-markers01.json"), None);
    }

    #[test]
    fn exhausted_backup_numbers_leave_current_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionedStore::new(crate::FsBackend::open(dir.path()).unwrap());
        let mut first = FlatSongRecord::empty("song", 1.0);
        first.title = "first".to_string();
        store.create("song", &first).unwrap();
        store
            .backend()
            .put(&backup_name("song", u32::MAX), "{}")
            .unwrap();

        assert!(matches!(
            store.update("song", &FlatSongRecord::empty("song", 2.0)),
            Err(StoreError::BackupLimit(_))
        ));
        assert_eq!(store.read_current("song").unwrap(), Some(first));
    }

    #[test]
    fn lists_ids_with_a_current_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionedStore::new(crate::FsBackend::open(dir.path()).unwrap());
        store.create("b", &FlatSongRecord::empty("b", 1.0)).unwrap();
        store.create("a-markers", &FlatSongRecord::empty("a-markers", 1.0)).unwrap();
        store.backend().put("c-markers01.json", "{}").unwrap();
        store.backend().put("notes.txt", "").unwrap();

        assert_eq!(store.list_ids().unwrap(), vec!["a-markers", "b"]);
    }

    #[test]
    fn rejects_path_like_ids() {
        for id in ["", "  ", "../etc", "a/b", "a\\b"] {
            assert!(matches!(validate_id(id), Err(StoreError::InvalidSlotId(_))), "{id:?}");
        }
        assert!(validate_id("Amarras").is_ok());
        assert!(validate_id("live set 2").is_ok());
    }
}
