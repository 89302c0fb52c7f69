use std::collections::HashMap;

use timeline::autogen::generate_from_markers;
use timeline::{
    check_contiguity, to_flat, to_nested, FlatSongRecord, Seconds, SongRecord, SongState,
};
use tracing::{info, warn};

use crate::{current_name, SlotBackend, StoreError, StoreResult, VersionedStore};

/// Source of per-track facts the engine needs to build a first record.
pub trait TrackProvider {
    fn duration(&self, song_id: &str) -> Option<Seconds>;
    fn audio_file(&self, song_id: &str) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub duration: Seconds,
    pub audio_file: Option<String>,
}

/// Fixed in-memory table of tracks.
#[derive(Debug, Clone, Default)]
pub struct StaticTrackProvider {
    tracks: HashMap<String, TrackInfo>,
}

impl StaticTrackProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(
        mut self,
        song_id: impl Into<String>,
        duration: Seconds,
        audio_file: Option<String>,
    ) -> Self {
        self.tracks.insert(
            song_id.into(),
            TrackInfo {
                duration,
                audio_file,
            },
        );
        self
    }
}

impl TrackProvider for StaticTrackProvider {
    fn duration(&self, song_id: &str) -> Option<Seconds> {
        self.tracks.get(song_id).map(|t| t.duration)
    }

    fn audio_file(&self, song_id: &str) -> Option<String> {
        self.tracks.get(song_id).and_then(|t| t.audio_file.clone())
    }
}

/// Empty timeline for `song_id`: no sections, no bars, identifiers filled in.
pub fn default_template(song_id: &str, tracks: &dyn TrackProvider) -> FlatSongRecord {
    let mut record = FlatSongRecord::empty(song_id, tracks.duration(song_id).unwrap_or(0.0));
    record.song_info.audio_file = tracks.audio_file(song_id);
    record.song_info.marker_file = Some(current_name(song_id));
    record
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    /// The previous current record was kept as this backup number.
    Updated { backup: u32 },
    /// Nothing was written.
    Unchanged,
}

/// Load/edit/save entry points used by the UI layer.
pub struct TimelineEngine<B, P> {
    store: VersionedStore<B>,
    tracks: P,
}

impl<B: SlotBackend, P: TrackProvider> TimelineEngine<B, P> {
    pub fn new(store: VersionedStore<B>, tracks: P) -> Self {
        Self { store, tracks }
    }

    pub fn store(&self) -> &VersionedStore<B> {
        &self.store
    }

    /// Nested record of `song_id`; a first access persists the default
    /// template.
    pub fn load_timeline(&self, song_id: &str) -> StoreResult<SongRecord> {
        let flat = self
            .store
            .read(song_id, |id| default_template(id, &self.tracks))?;
        Ok(to_nested(&flat))
    }

    /// Persists `record` as the current record of `song_id`, creating the
    /// slot on first save and rotating a backup otherwise.
    ///
    /// The saved state is always `Edited`: a saved change withdraws an
    /// earlier approval, and only [`approve`](Self::approve) sets `Approved`.
    pub fn save_timeline(&self, song_id: &str, record: &SongRecord) -> StoreResult<SaveOutcome> {
        if let Err(e) = check_contiguity(&record.sections) {
            warn!(song_id, error = %e, "saving a timeline that is not contiguous");
        }

        let mut flat = to_flat(record);
        flat.song_id = song_id.to_string();
        flat.song_info.song_id = song_id.to_string();
        if flat.song_info.marker_file.is_none() {
            flat.song_info.marker_file = Some(current_name(song_id));
        }
        if flat.song_info.state == SongState::Approved {
            info!(song_id, "saved changes withdraw the approval");
        }
        flat.song_info.state = SongState::Edited;
        self.persist(song_id, &flat)
    }

    fn persist(&self, song_id: &str, flat: &FlatSongRecord) -> StoreResult<SaveOutcome> {
        if self.store.exists(song_id)? {
            let backup = self.store.update(song_id, flat)?;
            Ok(SaveOutcome::Updated { backup })
        } else {
            self.store.create(song_id, flat)?;
            Ok(SaveOutcome::Created)
        }
    }

    /// Builds a timeline from two markers and stores it.
    ///
    /// Replaces a current record that has no bars yet (the untouched default
    /// template); any other existing record is a conflict.
    pub fn generate_timeline(
        &self,
        song_id: &str,
        first_marker: Seconds,
        second_marker: Seconds,
    ) -> StoreResult<SongRecord> {
        let duration = self
            .tracks
            .duration(song_id)
            .ok_or_else(|| StoreError::UnknownTrack(song_id.to_string()))?;

        if let Some(existing) = self.store.read_current(song_id)? {
            if !existing.bars.is_empty() {
                return Err(StoreError::Conflict(song_id.to_string()));
            }
        }

        let mut record = generate_from_markers(song_id, first_marker, second_marker, duration)?;
        record.song_info.audio_file = self.tracks.audio_file(song_id);
        record.song_info.marker_file = Some(current_name(song_id));

        let outcome = self.persist(song_id, &to_flat(&record))?;
        info!(song_id, bars = record.bar_count(), ?outcome, "generated timeline");
        Ok(record)
    }

    /// Marks the current record of `song_id` as approved. Approving an
    /// approved record writes nothing and returns [`SaveOutcome::Unchanged`].
    pub fn approve(&self, song_id: &str) -> StoreResult<SaveOutcome> {
        let mut flat = self
            .store
            .read_current(song_id)?
            .ok_or_else(|| StoreError::NotFound(song_id.to_string()))?;
        if flat.song_info.state == SongState::Approved {
            info!(song_id, "already approved");
            return Ok(SaveOutcome::Unchanged);
        }
        flat.song_info.state = SongState::Approved;
        let backup = self.store.update(song_id, &flat)?;
        info!(song_id, "approved");
        Ok(SaveOutcome::Updated { backup })
    }

    pub fn history(&self, song_id: &str) -> StoreResult<Vec<u32>> {
        self.store.list_backups(song_id)
    }

    /// Ids of every track whose current record is approved, sorted. Records
    /// that fail to parse are logged and skipped.
    pub fn approved_songs(&self) -> StoreResult<Vec<String>> {
        let mut approved = Vec::new();
        for id in self.store.list_ids()? {
            match self.store.read_current(&id) {
                Ok(Some(flat)) if flat.song_info.state == SongState::Approved => approved.push(id),
                Ok(_) => {}
                Err(e) => warn!(song_id = %id, error = %e, "skipping unreadable record"),
            }
        }
        Ok(approved)
    }
}
