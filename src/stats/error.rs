//! Lag test error types
//!
//! Only caller contract violations are errors. Running out of data is a
//! normal outcome and is reported through `LagOutcome::Insufficient`.

use thiserror::Error;

use crate::series::SeriesError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TestError {
    /// Lag tests only run on numeric series
    #[error("{test} test cannot run on time-of-day series '{series}'")]
    NonNumericSeries { test: &'static str, series: String },

    /// At least one member of the pair has no processed data
    #[error("{test} test needs processed data for both '{dependent}' and '{independent}'")]
    InvalidPair {
        test: &'static str,
        dependent: String,
        independent: String,
    },

    /// Test name not recognised
    #[error("Unknown test: {0}")]
    UnknownTest(String),

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Result type alias for lag test operations
pub type TestResult<T> = Result<T, TestError>;
