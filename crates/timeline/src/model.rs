use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{Seconds, TimelineError, CONTIGUITY_EPSILON};

/// Smallest unit of the timeline: a `[start, end)` interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub start: Seconds,
    pub end: Seconds,
}

impl Bar {
    pub fn new(id: impl Into<String>, label: impl Into<String>, start: Seconds, end: Seconds) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            start,
            end,
        }
    }

    pub fn duration(&self) -> Seconds {
        self.end - self.start
    }

    /// Numeric position encoded in the id, see [`bar_ordinal`].
    pub fn ordinal(&self) -> Option<u64> {
        bar_ordinal(&self.id)
    }
}

/// An ordered run of bars with a category tag (intro, verse, ...).
///
/// `start` and `end` mirror the first and last bar and are only ever written
/// by [`recompute_section_boundary`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub start: Seconds,
    #[serde(default)]
    pub end: Seconds,
    #[serde(default, alias = "markers")]
    pub bars: Vec<Bar>,
}

impl Section {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        label: impl Into<String>,
        bars: Vec<Bar>,
    ) -> Self {
        let mut section = Self {
            id: id.into(),
            kind: kind.into(),
            label: label.into(),
            start: 0.0,
            end: 0.0,
            bars,
        };
        recompute_section_boundary(&mut section);
        section
    }

    /// Creates a section of the given category with a fresh id and the
    /// conventional `"<Type> Section"` label.
    pub fn of_type(section_type: &str, bars: Vec<Bar>) -> Self {
        Self::new(
            fresh_section_id(),
            section_type.to_lowercase(),
            format!("{section_type} Section"),
            bars,
        )
    }

    pub fn position_of(&self, bar_id: &str) -> Option<usize> {
        self.bars.iter().position(|b| b.id == bar_id)
    }
}

pub fn fresh_section_id() -> String {
    format!("section-{}", Uuid::new_v4().simple())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SongState {
    /// Synthesized from the default template on first access.
    Created,
    /// Auto-divided from two user-chosen markers.
    Generated,
    /// Saved at least once after manual edits.
    Edited,
    Approved,
}

impl Default for SongState {
    fn default() -> Self {
        Self::Created
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SongInfo {
    #[serde(default, alias = "songID")]
    pub song_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_file: Option<String>,
    #[serde(default)]
    pub state: SongState,
}

/// Nested song record: sections own their bars. This is the in-memory form
/// every editor operation works on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SongRecord {
    #[serde(alias = "songID")]
    pub song_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub duration: Seconds,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub song_info: SongInfo,
    /// Top-level fields the engine does not interpret, carried through.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SongRecord {
    pub fn new(song_id: impl Into<String>, duration: Seconds) -> Self {
        let song_id = song_id.into();
        Self {
            title: song_id.clone(),
            duration,
            sections: Vec::new(),
            song_info: SongInfo {
                song_id: song_id.clone(),
                ..SongInfo::default()
            },
            song_id,
            extra: Map::new(),
        }
    }

    pub fn bars(&self) -> impl Iterator<Item = &Bar> {
        bars(&self.sections)
    }

    pub fn bar_count(&self) -> usize {
        self.sections.iter().map(|s| s.bars.len()).sum()
    }

    pub fn find_section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }
}

/// Sets `section.start`/`section.end` from its first/last bar, or zeroes both
/// when the section has no bars.
pub fn recompute_section_boundary(section: &mut Section) {
    match (section.bars.first(), section.bars.last()) {
        (Some(first), Some(last)) => {
            section.start = first.start;
            section.end = last.end;
        }
        _ => {
            section.start = 0.0;
            section.end = 0.0;
        }
    }
}

pub fn recompute_boundaries(sections: &mut [Section]) {
    for section in sections.iter_mut() {
        recompute_section_boundary(section);
    }
}

/// All bars in timeline order: section order, then bar order.
pub fn bars(sections: &[Section]) -> impl Iterator<Item = &Bar> {
    sections.iter().flat_map(|s| s.bars.iter())
}

/// Locates a bar as `(section_index, bar_index)`, first match wins.
pub fn find_bar(sections: &[Section], bar_id: &str) -> Option<(usize, usize)> {
    sections
        .iter()
        .enumerate()
        .find_map(|(si, s)| s.position_of(bar_id).map(|bi| (si, bi)))
}

/// Verifies every bar has positive length and every adjacent pair in
/// timeline order touches within [`CONTIGUITY_EPSILON`].
pub fn check_contiguity(sections: &[Section]) -> Result<(), TimelineError> {
    let mut prev: Option<&Bar> = None;
    for bar in bars(sections) {
        if bar.end <= bar.start {
            return Err(TimelineError::InvalidBar {
                bar_id: bar.id.clone(),
            });
        }
        if let Some(left) = prev {
            let gap = bar.start - left.end;
            if gap.abs() > CONTIGUITY_EPSILON {
                return Err(TimelineError::Discontiguous {
                    left: left.id.clone(),
                    right: bar.id.clone(),
                    gap,
                });
            }
        }
        prev = Some(bar);
    }
    Ok(())
}

/// Numeric value of a bar id: its trailing run of ASCII digits, so both
/// `"12"` and `"bar-12"` map to 12.
pub fn bar_ordinal(id: &str) -> Option<u64> {
    let id = id.trim();
    let prefix_len = id.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    let digits = &id[prefix_len..];
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Entry of a bar pick list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BarChoice {
    pub id: String,
    pub label: String,
}

pub fn bar_choices(sections: &[Section]) -> Vec<BarChoice> {
    bars(sections)
        .map(|b| BarChoice {
            id: b.id.clone(),
            label: b.label.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(id: u32, start: f64, end: f64) -> Bar {
        Bar::new(id.to_string(), format!("Bar {id}"), start, end)
    }

    #[test]
    fn boundary_follows_first_and_last_bar() {
        let mut section = Section::new("s", "verse", "Verse", vec![bar(1, 2.0, 4.0), bar(2, 4.0, 7.5)]);
        assert_eq!((section.start, section.end), (2.0, 7.5));

        section.bars.clear();
        recompute_section_boundary(&mut section);
        assert_eq!((section.start, section.end), (0.0, 0.0));
    }

    #[test]
    fn ordinal_uses_trailing_digits() {
        assert_eq!(bar_ordinal("7"), Some(7));
        assert_eq!(bar_ordinal("bar-12"), Some(12));
        assert_eq!(bar_ordinal(" 03 "), Some(3));
        assert_eq!(bar_ordinal("intro"), None);
        assert_eq!(bar_ordinal(""), None);
    }

    #[test]
    fn contiguity_reports_first_gap() {
        let sections = vec![
            Section::new("a", "intro", "Intro", vec![bar(1, 0.0, 3.0), bar(2, 3.0, 6.0)]),
            Section::new("b", "verse", "Verse", vec![bar(3, 6.5, 9.0)]),
        ];
        match check_contiguity(&sections) {
            Err(TimelineError::Discontiguous { left, right, .. }) => {
                assert_eq!(left, "2");
                assert_eq!(right, "3");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn contiguity_tolerates_rounding_noise() {
        let sections = vec![Section::new(
            "a",
            "intro",
            "Intro",
            vec![bar(1, 0.0, 3.333), bar(2, 3.33, 6.0)],
        )];
        assert!(check_contiguity(&sections).is_ok());
    }

    #[test]
    fn contiguity_rejects_inverted_bar() {
        let sections = vec![Section::new("a", "intro", "Intro", vec![bar(1, 3.0, 3.0)])];
        assert_eq!(
            check_contiguity(&sections),
            Err(TimelineError::InvalidBar {
                bar_id: "1".to_string()
            })
        );
    }

    #[test]
    fn legacy_markers_key_is_accepted() {
        let json = r#"{
            "id": "section-1",
            "type": "intro",
            "label": "Intro",
            "markers": [{ "id": "1", "label": "Bar 1", "start": 0.0, "end": 2.0 }]
        }"#;
        let section: Section = serde_json::from_str(json).unwrap();
        assert_eq!(section.bars.len(), 1);
        assert_eq!(section.kind, "intro");
        assert_eq!(section.start, 0.0);
    }

    #[test]
    fn unknown_record_fields_survive() {
        let json = r#"{
            "songId": "amarras",
            "title": "Amarras",
            "duration": 200.0,
            "sections": [],
            "songInfo": { "songId": "amarras", "state": "approved" },
            "chordNotation": ["Am", "G"]
        }"#;
        let record: SongRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.song_info.state, SongState::Approved);
        assert!(record.extra.contains_key("chordNotation"));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["chordNotation"][1], "G");
        assert_eq!(back["songInfo"]["state"], "approved");
    }

    #[test]
    fn bar_choices_follow_timeline_order() {
        let sections = vec![
            Section::new("a", "intro", "Intro", vec![bar(1, 0.0, 3.0)]),
            Section::new("b", "verse", "Verse", vec![bar(2, 3.0, 6.0), bar(3, 6.0, 9.0)]),
        ];
        let ids: Vec<_> = bar_choices(&sections).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert_eq!(find_bar(&sections, "3"), Some((1, 1)));
        assert_eq!(find_bar(&sections, "9"), None);
    }
}
