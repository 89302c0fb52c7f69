//! Builds a first timeline from two user-chosen markers by dividing each
//! resulting span into equal-length bars.

use tracing::debug;

use crate::{round_time, Bar, Seconds, Section, SongRecord, SongState, TimelineError};

/// Bars generated per section.
pub const BARS_PER_SECTION: usize = 32;

/// A first marker later than this opens the song with an intro section.
pub const INTRO_THRESHOLD: Seconds = 0.3;

/// Shortest span that still gets its own section.
const MIN_SPAN: Seconds = 0.01;

/// Divides `[start, end]` into `count` contiguous bars numbered from
/// `first_ordinal`.
///
/// Boundaries are rounded to hundredths; the count is reduced when the span
/// is too short for `count` distinct hundredth boundaries.
pub fn generate_bars(start: Seconds, end: Seconds, count: usize, first_ordinal: u64) -> Vec<Bar> {
    let span = end - start;
    let fit = (span / MIN_SPAN).floor() as usize;
    let count = count.min(fit).max(1);
    let step = span / count as f64;

    (0..count)
        .map(|i| {
            let n = first_ordinal + i as u64;
            let bar_start = round_time(start + step * i as f64);
            let bar_end = if i + 1 == count {
                round_time(end)
            } else {
                round_time(start + step * (i + 1) as f64)
            };
            Bar::new(n.to_string(), format!("Bar {n}"), bar_start, bar_end)
        })
        .collect()
}

/// Generates the record for a track from two markers.
///
/// An intro covers `[0, first]` when `first` exceeds [`INTRO_THRESHOLD`];
/// "Section 1" runs up to `second` and "Section 2" covers the rest of the
/// track when anything is left.
pub fn generate_from_markers(
    song_id: &str,
    first: Seconds,
    second: Seconds,
    duration: Seconds,
) -> Result<SongRecord, TimelineError> {
    let valid = [first, second, duration].iter().all(|v| v.is_finite())
        && first >= 0.0
        && second - first >= MIN_SPAN
        && second <= duration;
    if !valid {
        return Err(TimelineError::InvalidMarkers {
            first,
            second,
            duration,
        });
    }

    let has_intro = first > INTRO_THRESHOLD;
    let mut spans: Vec<(&str, String, Seconds, Seconds)> = Vec::with_capacity(3);
    if has_intro {
        spans.push(("intro", "Intro".to_string(), 0.0, first));
    }
    spans.push((
        "section",
        "Section 1".to_string(),
        if has_intro { first } else { 0.0 },
        second,
    ));
    if duration - second >= MIN_SPAN {
        spans.push(("section", "Section 2".to_string(), second, duration));
    }

    let mut record = SongRecord::new(song_id, round_time(duration));
    record.song_info.state = SongState::Generated;

    let mut next_ordinal = 1;
    for (i, (kind, label, start, end)) in spans.into_iter().enumerate() {
        let bars = generate_bars(start, end, BARS_PER_SECTION, next_ordinal);
        next_ordinal += bars.len() as u64;
        record
            .sections
            .push(Section::new(format!("section-{}", i + 1), kind, label, bars));
    }

    debug!(
        song_id,
        sections = record.sections.len(),
        bars = record.bar_count(),
        "generated timeline from markers"
    );
    Ok(record)
}
