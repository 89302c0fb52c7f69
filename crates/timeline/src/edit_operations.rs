//! Ripple edits over the whole timeline.
//!
//! Both operations treat the sections as one flattened bar sequence, so a
//! change propagates across section boundaries and every section boundary is
//! recomputed afterwards.
use tracing::{debug, warn};

use crate::{recompute_boundaries, round_time, Seconds, Section, TimelineError};

/// Result of an edit that did not fail.
///
/// `SoftMiss` means the request named something that isn't there (or the
/// anchor bar); the timeline was left exactly as it was.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum EditOutcome {
    Applied,
    SoftMiss { reason: String },
}

impl EditOutcome {
    pub(crate) fn soft_miss(reason: impl Into<String>) -> Self {
        Self::SoftMiss {
            reason: reason.into(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// `(section_index, bar_index)` of every bar in timeline order.
fn bar_positions(sections: &[Section]) -> Vec<(usize, usize)> {
    sections
        .iter()
        .enumerate()
        .flat_map(|(si, s)| (0..s.bars.len()).map(move |bi| (si, bi)))
        .collect()
}

fn locate(sections: &[Section], positions: &[(usize, usize)], bar_id: &str) -> Option<usize> {
    positions
        .iter()
        .position(|&(s, b)| sections[s].bars[b].id == bar_id)
}

/// Shifts a bar by `delta` seconds, keeping its length.
///
/// The preceding bar absorbs the change by moving its end; every following
/// bar is re-chained from the new end with its own original length. The first
/// bar of the timeline is the anchor and is never moved.
pub fn adjust_bar_time(
    sections: &mut [Section],
    bar_id: &str,
    delta: Seconds,
) -> Result<EditOutcome, TimelineError> {
    if !delta.is_finite() {
        return Err(TimelineError::Validation(format!(
            "shift must be a finite number of seconds, got {delta}"
        )));
    }

    let positions = bar_positions(sections);
    let Some(target) = locate(sections, &positions, bar_id) else {
        warn!(bar_id, "bar not found, timeline unchanged");
        return Ok(EditOutcome::soft_miss(format!("bar {bar_id} not found")));
    };
    if target == 0 {
        warn!(bar_id, "refusing to shift the anchor bar");
        return Ok(EditOutcome::soft_miss(format!(
            "bar {bar_id} is the first bar of the timeline"
        )));
    }

    let (ps, pb) = positions[target - 1];
    let (ts, tb) = positions[target];
    let new_start = round_time(sections[ts].bars[tb].start + delta);
    if new_start <= sections[ps].bars[pb].start {
        return Err(TimelineError::BarCollapse {
            bar_id: sections[ps].bars[pb].id.clone(),
        });
    }

    sections[ps].bars[pb].end = new_start;

    let mut cursor = new_start;
    for &(s, b) in &positions[target..] {
        let bar = &mut sections[s].bars[b];
        let length = bar.duration();
        bar.start = cursor;
        bar.end = round_time(cursor + length);
        cursor = bar.end;
    }

    recompute_boundaries(sections);
    debug!(bar_id, delta, rippled = positions.len() - target, "shifted bar");
    Ok(EditOutcome::Applied)
}

/// Forces the bar `bar_id` and every bar after it to `new_length` seconds.
///
/// The found bar keeps its start; later bars are chained from the previous
/// end. Unlike [`adjust_bar_time`], original lengths past the anchor point
/// are discarded.
pub fn apply_uniform_length(
    sections: &mut [Section],
    bar_id: &str,
    new_length: Seconds,
) -> Result<EditOutcome, TimelineError> {
    if !new_length.is_finite() || new_length <= 0.0 {
        return Err(TimelineError::InvalidLength(new_length));
    }

    let positions = bar_positions(sections);
    let Some(target) = locate(sections, &positions, bar_id) else {
        warn!(bar_id, "bar not found, no changes applied");
        return Ok(EditOutcome::soft_miss(format!("bar {bar_id} not found")));
    };

    let (ts, tb) = positions[target];
    let mut cursor = round_time(sections[ts].bars[tb].start);
    for &(s, b) in &positions[target..] {
        let bar = &mut sections[s].bars[b];
        bar.start = cursor;
        bar.end = round_time(cursor + new_length);
        cursor = bar.end;
    }

    recompute_boundaries(sections);
    debug!(bar_id, new_length, rescaled = positions.len() - target, "applied uniform bar length");
    Ok(EditOutcome::Applied)
}
