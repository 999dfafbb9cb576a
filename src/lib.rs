//! # lagscope
//!
//! Lagged relationships between personal tracking variables.
//!
//! Daily readings (mood, sleep, habits, nutrition, ring metrics) are loaded
//! into series, normalized onto a contiguous calendar, optionally resampled
//! to weeks or months, and compared pairwise with lag tests to see whether
//! one variable tends to move some days after another.
//!
//! ## Modules
//!
//! - [`series`]: series normalization (fill, resample, pairs, registry)
//! - [`stats`]: lag tests (linear regression, Granger causality, impact)
//! - [`sources`]: manual logs and integration exports
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lagscope::config::Config;
//! use lagscope::series::{FillStrategy, Frequency, GroupingMethod, RoleSettings, SeriesPair, SeriesRegistry};
//! use lagscope::sources::load_all;
//! use lagscope::stats::{LagTest, TestKind};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let mut registry = SeriesRegistry::new();
//!     load_all(&config, &mut registry);
//!
//!     // Does sleep predict next-day mood?
//!     let mut pair = SeriesPair::new(registry.get("Mood")?, registry.get("Total Sleep")?);
//!     pair.update_calculation(
//!         Frequency::Daily,
//!         &RoleSettings::uniform(GroupingMethod::Average),
//!         &RoleSettings::uniform(FillStrategy::MeanExcludingMissing),
//!         None,
//!         true,
//!     )?;
//!
//!     let dependent = pair.dependent().borrow();
//!     let independent = pair.independent().ok_or("no independent series")?.borrow();
//!     let test = TestKind::Pearson.build(&dependent, &independent);
//!     let outcome = test.run_over_range(&dependent, &independent, 0, 4)?;
//!     println!("{:?}", outcome.scores());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod series;
pub mod sources;
pub mod stats;

// Re-export top-level types for convenience
pub use series::{
    DateRange, FillStrategy, Frequency, GroupingMethod, Observation, Provenance, Score, Series,
    SeriesError, SeriesPair, SeriesRegistry, SeriesResult, SharedSeries, VariableKind,
};

pub use stats::{
    relationship_matrix, test_names, LagOutcome, LagScore, LagTest, RangeOutcome, RelationshipMatrix,
    TestError, TestKind, TestResult,
};

pub use sources::{load_all, SourceAdapter, SourceError, SourceResult, SourceRows};

pub use config::{Config, ConfigError};
