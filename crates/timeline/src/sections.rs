//! Structural edits: carving a bar range out into its own section and
//! merging a section back into its predecessor.
use tracing::{debug, warn};

use crate::{
    fresh_section_id, recompute_boundaries, recompute_section_boundary, EditOutcome, Section,
    TimelineError,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SectionSplit {
    /// The input section minus the extracted bars. Its boundary is `(0, 0)`
    /// when every bar was extracted.
    pub original: Section,
    pub new_section: Section,
}

/// Moves the inclusive bar range `bar_id_start..=bar_id_end` of `section`
/// into a new section of type `new_type`.
///
/// Reversed ids are accepted. Returns `None` when either id is not in the
/// section; the input is never modified.
pub fn split_section_by_bar_range(
    section: &Section,
    bar_id_start: &str,
    bar_id_end: &str,
    new_type: &str,
) -> Option<SectionSplit> {
    let (Some(mut lo), Some(mut hi)) = (
        section.position_of(bar_id_start),
        section.position_of(bar_id_end),
    ) else {
        warn!(
            section = %section.id,
            bar_id_start, bar_id_end, "bar IDs not found or invalid range"
        );
        return None;
    };
    if lo > hi {
        std::mem::swap(&mut lo, &mut hi);
    }

    let mut original = section.clone();
    let extracted: Vec<_> = original.bars.drain(lo..=hi).collect();
    recompute_section_boundary(&mut original);
    let new_section = Section::of_type(new_type, extracted);

    Some(SectionSplit {
        original,
        new_section,
    })
}

/// Removes the section at `index`, appending its bars to the previous
/// section. Boundaries are left for the caller to recompute.
pub fn delete_section(sections: &mut Vec<Section>, index: usize) -> Result<(), TimelineError> {
    if sections.len() <= 1 {
        return Err(TimelineError::CannotDeleteOnlySection);
    }
    if index == 0 {
        return Err(TimelineError::CannotDeleteFirstSection);
    }
    if index >= sections.len() {
        return Err(TimelineError::SectionIndexOutOfRange {
            index,
            len: sections.len(),
        });
    }

    let removed = sections.remove(index);
    sections[index - 1].bars.extend(removed.bars);
    Ok(())
}

/// Splits the section `section_id` and keeps the section list in time order.
///
/// The extracted range lands right after the bars that precede it. Bars that
/// follow the range move into a section of the original type placed after
/// the new one, and a section left without bars is dropped.
pub fn split_section(
    sections: &mut Vec<Section>,
    section_id: &str,
    bar_id_start: &str,
    bar_id_end: &str,
    new_type: &str,
) -> Result<EditOutcome, TimelineError> {
    if new_type.trim().is_empty() {
        return Err(TimelineError::Validation(
            "section type must not be empty".to_string(),
        ));
    }
    let Some(index) = sections.iter().position(|s| s.id == section_id) else {
        warn!(section_id, "section not found, timeline unchanged");
        return Ok(EditOutcome::soft_miss(format!(
            "section {section_id} not found"
        )));
    };
    let Some(SectionSplit {
        mut original,
        new_section,
    }) = split_section_by_bar_range(&sections[index], bar_id_start, bar_id_end, new_type)
    else {
        return Ok(EditOutcome::soft_miss(
            "bar IDs not found or invalid range",
        ));
    };

    // Number of bars in front of the extracted range.
    let head_len = new_section
        .bars
        .first()
        .and_then(|b| sections[index].position_of(&b.id))
        .unwrap_or(0);
    let tail = original.bars.split_off(head_len);

    let mut replacement = Vec::with_capacity(3);
    match (original.bars.is_empty(), tail.is_empty()) {
        (false, false) => {
            let trailing = Section::new(
                fresh_section_id(),
                original.kind.clone(),
                original.label.clone(),
                tail,
            );
            replacement.push(original);
            replacement.push(new_section);
            replacement.push(trailing);
        }
        (false, true) => {
            replacement.push(original);
            replacement.push(new_section);
        }
        (true, false) => {
            original.bars = tail;
            replacement.push(new_section);
            replacement.push(original);
        }
        (true, true) => {
            debug!(section_id, "split consumed every bar, dropping section");
            replacement.push(new_section);
        }
    }

    sections.splice(index..=index, replacement);
    recompute_boundaries(sections);
    debug!(section_id, bar_id_start, bar_id_end, new_type, "split section");
    Ok(EditOutcome::Applied)
}

/// Merges the section `section_id` into its predecessor and recomputes every
/// boundary.
pub fn delete_section_by_id(
    sections: &mut Vec<Section>,
    section_id: &str,
) -> Result<EditOutcome, TimelineError> {
    let Some(index) = sections.iter().position(|s| s.id == section_id) else {
        warn!(section_id, "section not found, timeline unchanged");
        return Ok(EditOutcome::soft_miss(format!(
            "section {section_id} not found"
        )));
    };
    delete_section(sections, index)?;
    recompute_boundaries(sections);
    debug!(section_id, "merged section into its predecessor");
    Ok(EditOutcome::Applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bars, check_contiguity, Bar};

    fn create_test_timeline() -> Vec<Section> {
        let bar = |n: u32| {
            let start = f64::from(n - 1) * 3.0;
            Bar::new(n.to_string(), format!("Bar {n}"), start, start + 3.0)
        };
        vec![
            Section::new("section-1", "intro", "Intro", (1..=4).map(bar).collect()),
            Section::new("section-2", "verse", "Verse", (5..=8).map(bar).collect()),
        ]
    }

    fn ids(section: &Section) -> Vec<&str> {
        section.bars.iter().map(|b| b.id.as_str()).collect()
    }

    #[test]
    fn test_split_extracts_inclusive_range() {
        let timeline = create_test_timeline();
        let split = split_section_by_bar_range(&timeline[1], "7", "8", "Outro").unwrap();

        assert_eq!(ids(&split.new_section), ["7", "8"]);
        assert_eq!(split.new_section.kind, "outro");
        assert_eq!(split.new_section.label, "Outro Section");
        assert_eq!((split.new_section.start, split.new_section.end), (18.0, 24.0));

        assert_eq!(ids(&split.original), ["5", "6"]);
        assert_eq!((split.original.start, split.original.end), (12.0, 18.0));
        assert_eq!(split.original.id, "section-2");
    }

    #[test]
    fn test_split_swaps_reversed_ids() {
        let timeline = create_test_timeline();
        let split = split_section_by_bar_range(&timeline[0], "3", "2", "bridge").unwrap();
        assert_eq!(ids(&split.new_section), ["2", "3"]);
        assert_eq!(ids(&split.original), ["1", "4"]);
    }

    #[test]
    fn test_split_with_unknown_bar_fails_softly() {
        let timeline = create_test_timeline();
        assert!(split_section_by_bar_range(&timeline[0], "1", "5", "bridge").is_none());
        assert!(split_section_by_bar_range(&timeline[0], "x", "2", "bridge").is_none());
        assert_eq!(timeline, create_test_timeline());
    }

    #[test]
    fn test_split_everything_leaves_zeroed_original() {
        let timeline = create_test_timeline();
        let split = split_section_by_bar_range(&timeline[0], "1", "4", "intro").unwrap();
        assert!(split.original.bars.is_empty());
        assert_eq!((split.original.start, split.original.end), (0.0, 0.0));
        assert_eq!((split.new_section.start, split.new_section.end), (0.0, 12.0));
    }

    #[test]
    fn test_delete_section_rules() {
        let mut timeline = create_test_timeline();
        assert_eq!(
            delete_section(&mut timeline, 0),
            Err(TimelineError::CannotDeleteFirstSection)
        );
        assert_eq!(
            delete_section(&mut timeline, 2),
            Err(TimelineError::SectionIndexOutOfRange { index: 2, len: 2 })
        );

        delete_section(&mut timeline, 1).unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(ids(&timeline[0]), ["1", "2", "3", "4", "5", "6", "7", "8"]);
        recompute_boundaries(&mut timeline);
        assert_eq!((timeline[0].start, timeline[0].end), (0.0, 24.0));

        assert_eq!(
            delete_section(&mut timeline, 0),
            Err(TimelineError::CannotDeleteOnlySection)
        );
    }

    #[test]
    fn test_split_section_in_the_middle_keeps_order() {
        let mut timeline = create_test_timeline();
        let outcome = split_section(&mut timeline, "section-1", "2", "3", "Bridge").unwrap();
        assert!(outcome.is_applied());

        assert_eq!(timeline.len(), 4);
        assert_eq!(ids(&timeline[0]), ["1"]);
        assert_eq!(ids(&timeline[1]), ["2", "3"]);
        assert_eq!(timeline[1].kind, "bridge");
        assert_eq!(ids(&timeline[2]), ["4"]);
        assert_eq!(timeline[2].kind, "intro");
        assert_ne!(timeline[2].id, "section-1");
        assert_eq!(timeline[0].id, "section-1");
        check_contiguity(&timeline).unwrap();
        assert_eq!(bars(&timeline).count(), 8);
    }

    #[test]
    fn test_split_section_at_the_front() {
        let mut timeline = create_test_timeline();
        assert!(split_section(&mut timeline, "section-2", "5", "6", "chorus").unwrap().is_applied());
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline[1].kind, "chorus");
        assert_eq!(ids(&timeline[2]), ["7", "8"]);
        assert_eq!(timeline[2].id, "section-2");
        assert_eq!((timeline[2].start, timeline[2].end), (18.0, 24.0));
        check_contiguity(&timeline).unwrap();
    }

    #[test]
    fn test_split_section_taking_every_bar_drops_original() {
        let mut timeline = create_test_timeline();
        assert!(split_section(&mut timeline, "section-2", "8", "5", "outro").unwrap().is_applied());
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[1].kind, "outro");
        assert_eq!(ids(&timeline[1]), ["5", "6", "7", "8"]);
    }

    #[test]
    fn test_split_section_soft_misses() {
        let original = create_test_timeline();
        let mut timeline = original.clone();
        let outcome = split_section(&mut timeline, "nope", "1", "2", "bridge").unwrap();
        assert!(!outcome.is_applied());
        let outcome = split_section(&mut timeline, "section-1", "1", "99", "bridge").unwrap();
        assert!(!outcome.is_applied());
        assert_eq!(timeline, original);

        assert!(split_section(&mut timeline, "section-1", "1", "2", " ").is_err());
        assert_eq!(timeline, original);
    }

    #[test]
    fn test_delete_section_by_id() {
        let mut timeline = create_test_timeline();
        let outcome = delete_section_by_id(&mut timeline, "missing").unwrap();
        assert!(!outcome.is_applied());

        assert_eq!(
            delete_section_by_id(&mut timeline, "section-1"),
            Err(TimelineError::CannotDeleteFirstSection)
        );

        assert!(delete_section_by_id(&mut timeline, "section-2").unwrap().is_applied());
        assert_eq!(timeline.len(), 1);
        assert_eq!((timeline[0].start, timeline[0].end), (0.0, 24.0));
    }
}
