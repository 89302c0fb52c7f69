//! Conversion between the nested record (sections own their bars) and the
//! flat record that is persisted (one global bar list, sections referencing
//! an inclusive bar-id range).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{bar_ordinal, Bar, Seconds, Section, SongInfo, SongRecord};

/// Bar id written for a section that references no bars.
pub const EMPTY_BAR_ID: &str = "0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlatSection {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub label: String,
    pub start_bar_id: String,
    pub end_bar_id: String,
    #[serde(default)]
    pub start_time: Seconds,
    #[serde(default)]
    pub end_time: Seconds,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlatSongRecord {
    #[serde(alias = "songID")]
    pub song_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub duration: Seconds,
    #[serde(default, alias = "sectionsList")]
    pub sections: Vec<FlatSection>,
    #[serde(default)]
    pub bars: Vec<Bar>,
    #[serde(default)]
    pub song_info: SongInfo,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlatSongRecord {
    pub fn empty(song_id: impl Into<String>, duration: Seconds) -> Self {
        to_flat(&SongRecord::new(song_id, duration))
    }
}

/// Embeds into every section the global bars whose ordinal lies in
/// `[startBarId, endBarId]`.
///
/// Bars keep the order of the global list; nothing is sorted here. A section
/// with the empty sentinel range, ids that don't parse, or a range matching
/// nothing gets no bars and a `(0, 0)` boundary. Stored times are ignored.
pub fn to_nested(flat: &FlatSongRecord) -> SongRecord {
    let ordinals: Vec<Option<u64>> = flat.bars.iter().map(|b| bar_ordinal(&b.id)).collect();

    let sections = flat
        .sections
        .iter()
        .map(|fs| {
            let bars: Vec<Bar> = if is_empty_range(fs) {
                Vec::new()
            } else {
                match (bar_ordinal(&fs.start_bar_id), bar_ordinal(&fs.end_bar_id)) {
                    (Some(lo), Some(hi)) => flat
                        .bars
                        .iter()
                        .zip(&ordinals)
                        .filter(|(_, n)| matches!(n, Some(n) if (lo..=hi).contains(n)))
                        .map(|(b, _)| b.clone())
                        .collect(),
                    _ => Vec::new(),
                }
            };
            Section::new(fs.id.clone(), fs.kind.clone(), fs.label.clone(), bars)
        })
        .collect();

    SongRecord {
        song_id: flat.song_id.clone(),
        title: flat.title.clone(),
        duration: flat.duration,
        sections,
        song_info: flat.song_info.clone(),
        extra: flat.extra.clone(),
    }
}

/// The `"0"`/`"0"` pair written for a section without bars. A real section
/// holding only bar `"0"` has the same ids but a positive span.
fn is_empty_range(section: &FlatSection) -> bool {
    section.start_bar_id == EMPTY_BAR_ID
        && section.end_bar_id == EMPTY_BAR_ID
        && section.end_time <= section.start_time
}

/// Inverse of [`to_nested`]: sections become bar-id ranges over one global
/// bar list sorted by start time. Bars sharing an id collapse to the last one
/// seen.
pub fn to_flat(nested: &SongRecord) -> FlatSongRecord {
    let mut by_id: HashMap<&str, &Bar> = HashMap::new();

    let sections = nested
        .sections
        .iter()
        .map(|section| {
            let mut sorted: Vec<&Bar> = section.bars.iter().collect();
            sorted.sort_by(|a, b| a.start.total_cmp(&b.start));
            for bar in &sorted {
                by_id.insert(bar.id.as_str(), bar);
            }
            let (start_bar_id, end_bar_id, start_time, end_time) =
                match (sorted.first(), sorted.last()) {
                    (Some(first), Some(last)) => {
                        (first.id.clone(), last.id.clone(), first.start, last.end)
                    }
                    _ => (EMPTY_BAR_ID.to_string(), EMPTY_BAR_ID.to_string(), 0.0, 0.0),
                };
            FlatSection {
                id: section.id.clone(),
                kind: section.kind.clone(),
                label: section.label.clone(),
                start_bar_id,
                end_bar_id,
                start_time,
                end_time,
            }
        })
        .collect();

    let mut bars: Vec<Bar> = by_id.into_values().cloned().collect();
    bars.sort_by(|a, b| {
        a.start
            .total_cmp(&b.start)
            .then_with(|| bar_ordinal(&a.id).cmp(&bar_ordinal(&b.id)))
    });

    FlatSongRecord {
        song_id: nested.song_id.clone(),
        title: nested.title.clone(),
        duration: nested.duration,
        sections,
        bars,
        song_info: nested.song_info.clone(),
        extra: nested.extra.clone(),
    }
}
