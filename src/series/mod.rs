//! Series normalization
//!
//! Turns irregular, possibly duplicated daily readings into contiguous,
//! gap-filled, optionally resampled tables ready for the lag tests:
//! - `types`: scores, date ranges and processing policies
//! - `kind`: per-kind statistics (continuous, binary, time, duration)
//! - `fill`: duplicate merge and reindex-and-fill
//! - `resample`: weekly and monthly buckets
//! - `series`: the `Series` entity
//! - `pair`: series analysed together and their alignment
//! - `registry`: named, categorised collection of series

pub mod error;
pub mod fill;
pub mod kind;
pub mod pair;
pub mod registry;
pub mod resample;
#[allow(clippy::module_inception)]
pub mod series;
pub mod types;

pub use error::{SeriesError, SeriesResult};
pub use fill::DailyTable;
pub use kind::VariableKind;
pub use pair::{shared, Role, RoleSettings, SeriesPair, SharedSeries};
pub use registry::SeriesRegistry;
pub use series::{Series, MIN_ANALYZABLE_POINTS};
pub use types::{
    DateRange, FillStrategy, Frequency, GroupingMethod, Observation, Provenance, RingCategory,
    Score,
};
