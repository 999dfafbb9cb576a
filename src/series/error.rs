//! Series error types
//!
//! Normalization itself does not fail on short or empty data; these errors
//! are caller contract violations (unsupported policy for a kind, a score of
//! the wrong shape) and registry lookups.

use chrono::NaiveDate;
use thiserror::Error;

use super::kind::VariableKind;
use super::types::{FillStrategy, GroupingMethod};

/// Errors raised by the series layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    /// Fill strategy not available for this kind of variable
    #[error("Fill strategy '{strategy}' is not supported for {kind} series")]
    UnsupportedFill {
        strategy: FillStrategy,
        kind: VariableKind,
    },

    /// Grouping method not available for this kind of variable
    #[error("Grouping method '{grouping}' is not supported for {kind} series")]
    UnsupportedGrouping {
        grouping: GroupingMethod,
        kind: VariableKind,
    },

    /// A policy string could not be parsed
    #[error("Unknown {policy}: {value}")]
    UnknownPolicy { policy: &'static str, value: String },

    /// A score does not match the series kind (e.g. a time for a continuous series)
    #[error("Score {score} does not fit {kind} series '{series}'")]
    KindMismatch {
        series: String,
        kind: VariableKind,
        score: String,
    },

    /// Range start after its end
    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// A series with this name is already registered
    #[error("Series already registered: {0}")]
    DuplicateName(String),

    /// Requested series does not exist
    #[error("Series not found: {0}")]
    NotFound(String),

    /// Role settings did not provide a value for a pair member
    #[error("Missing {0} setting for pair member")]
    MissingRoleSetting(&'static str),
}

/// Result type alias for series operations
pub type SeriesResult<T> = Result<T, SeriesError>;
