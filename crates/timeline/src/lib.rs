use thiserror::Error;

mod model;
pub use model::*;
mod flat;
pub use flat::*;
pub mod autogen;
pub mod edit_operations;
pub use edit_operations::{adjust_bar_time, apply_uniform_length, EditOutcome};
pub mod sections;
pub use sections::{
    delete_section, delete_section_by_id, split_section, split_section_by_bar_range, SectionSplit,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimelineError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("cannot delete the first section")]
    CannotDeleteFirstSection,
    #[error("cannot delete the only section in the song")]
    CannotDeleteOnlySection,
    #[error("section index {index} out of range ({len} sections)")]
    SectionIndexOutOfRange { index: usize, len: usize },
    #[error("bar length must be a positive number of seconds, got {0}")]
    InvalidLength(f64),
    #[error("shifting bar {bar_id} would collapse a bar to zero length")]
    BarCollapse { bar_id: String },
    #[error("bar {bar_id} ends before it starts")]
    InvalidBar { bar_id: String },
    #[error("bars {left} and {right} are not contiguous (gap {gap:.3}s)")]
    Discontiguous {
        left: String,
        right: String,
        gap: f64,
    },
    #[error("markers must satisfy 0 <= first < second <= duration (got {first}, {second}, {duration})")]
    InvalidMarkers {
        first: f64,
        second: f64,
        duration: f64,
    },
}

/// Seconds on the timeline.
pub type Seconds = f64;

/// Tolerance used when comparing adjacent bar boundaries.
pub const CONTIGUITY_EPSILON: Seconds = 0.01;

/// Rounds a time value to two decimals, applied on every write so repeated
/// edits don't accumulate floating error.
pub fn round_time(value: Seconds) -> Seconds {
    (value * 100.0).round() / 100.0
}
