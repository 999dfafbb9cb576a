//! Lag-correlation tests
//!
//! Every test measures how strongly an independent series relates to a
//! dependent series some number of periods later:
//! - `pearson`: linear regression, effect size R²
//! - `granger`: Granger causality F-test, effect size eta²
//! - `impact`: directional change heuristics, score in -1..1
//!
//! Tests pair `independent[t]` with `dependent[t + lag]` over the dates both
//! series share. Running out of data is reported as
//! `LagOutcome::Insufficient`, never as an error.

pub mod error;
pub mod granger;
pub mod impact;
pub mod matrix;
pub mod pearson;
pub mod regression;

pub use error::{TestError, TestResult};
pub use granger::GrangerTest;
pub use impact::{BinaryImpactTest, ContinuousImpactTest, ImpactTest};
pub use matrix::{relationship_matrix, RelationshipMatrix};
pub use pearson::PearsonTest;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::series::{Score, Series, VariableKind};

/// Sentinel reported for an effect size or p-value that could not be computed
pub const INVALID: f64 = -1.0;

/// Effect size and significance at one lag
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LagScore {
    pub lag: usize,
    pub effect_size: f64,
    /// `INVALID` for tests without a p-value
    pub p_value: f64,
}

impl LagScore {
    pub fn new(lag: usize, effect_size: f64, p_value: f64) -> Self {
        Self {
            lag,
            effect_size,
            p_value,
        }
    }

    /// Degenerate input: both numbers set to the sentinel
    pub fn invalid(lag: usize) -> Self {
        Self::new(lag, INVALID, INVALID)
    }

    pub fn is_invalid(&self) -> bool {
        self.effect_size == INVALID && self.p_value == INVALID
    }
}

/// Result of a test at a single lag
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LagOutcome {
    Scored(LagScore),
    Insufficient { reason: String },
}

impl LagOutcome {
    pub fn insufficient(reason: impl Into<String>) -> Self {
        LagOutcome::Insufficient {
            reason: reason.into(),
        }
    }

    pub fn score(&self) -> Option<&LagScore> {
        match self {
            LagOutcome::Scored(score) => Some(score),
            LagOutcome::Insufficient { .. } => None,
        }
    }
}

/// Result of a test over a window of lags, as parallel lists
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RangeOutcome {
    Scored {
        lags: Vec<usize>,
        effect_sizes: Vec<f64>,
        p_values: Vec<f64>,
    },
    Insufficient {
        reason: String,
    },
}

impl RangeOutcome {
    pub fn insufficient(reason: impl Into<String>) -> Self {
        RangeOutcome::Insufficient {
            reason: reason.into(),
        }
    }

    pub fn from_scores(scores: &[LagScore]) -> Self {
        RangeOutcome::Scored {
            lags: scores.iter().map(|s| s.lag).collect(),
            effect_sizes: scores.iter().map(|s| s.effect_size).collect(),
            p_values: scores.iter().map(|s| s.p_value).collect(),
        }
    }

    /// Scores per lag, empty when insufficient
    pub fn scores(&self) -> Vec<LagScore> {
        match self {
            RangeOutcome::Scored {
                lags,
                effect_sizes,
                p_values,
            } => lags
                .iter()
                .zip(effect_sizes)
                .zip(p_values)
                .map(|((lag, e), p)| LagScore::new(*lag, *e, *p))
                .collect(),
            RangeOutcome::Insufficient { .. } => Vec::new(),
        }
    }
}

/// A pairwise lag-correlation test
pub trait LagTest {
    /// Short name, one of `test_names()`
    fn name(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    /// Whether swapping the series gives the same result at lag 0
    fn is_symmetric(&self) -> bool;

    /// Run at one lag on inputs that already passed the precondition checks
    fn run_valid_for_lag(&self, dependent: &Series, independent: &Series, lag: usize) -> LagOutcome;

    /// Run at one lag, rejecting time-of-day series and pairs without data
    fn run_for_lag(&self, dependent: &Series, independent: &Series, lag: usize) -> TestResult<LagOutcome> {
        check_preconditions(self.name(), dependent, independent)?;
        let outcome = self.run_valid_for_lag(dependent, independent, lag);
        debug!(
            test = self.name(),
            dependent = dependent.name(),
            independent = independent.name(),
            lag,
            scored = outcome.score().is_some(),
            "Ran lag test"
        );
        Ok(outcome)
    }

    /// Run once per lag in `[min_lag, max_lag)`.
    ///
    /// Every lag gets an entry; a lag without enough data is reported with
    /// the `INVALID` sentinel. The outcome is insufficient only when no lag
    /// scored.
    fn run_over_range(
        &self,
        dependent: &Series,
        independent: &Series,
        min_lag: usize,
        max_lag: usize,
    ) -> TestResult<RangeOutcome> {
        let mut scores = Vec::new();
        let mut scored_any = false;
        let mut first_reason = None;
        for lag in min_lag..max_lag {
            match self.run_for_lag(dependent, independent, lag)? {
                LagOutcome::Scored(score) => {
                    scored_any = true;
                    scores.push(score);
                }
                LagOutcome::Insufficient { reason } => {
                    first_reason.get_or_insert(reason);
                    scores.push(LagScore::invalid(lag));
                }
            }
        }
        match first_reason {
            Some(reason) if !scored_any => Ok(RangeOutcome::Insufficient { reason }),
            _ => Ok(RangeOutcome::from_scores(&scores)),
        }
    }
}

/// Fail loudly when a caller hands a test data it cannot use
pub fn check_preconditions(test: &'static str, dependent: &Series, independent: &Series) -> TestResult<()> {
    for series in [dependent, independent] {
        if series.kind() == VariableKind::Time {
            return Err(TestError::NonNumericSeries {
                test,
                series: series.name().to_string(),
            });
        }
    }
    if dependent.processed().is_empty() || independent.processed().is_empty() {
        return Err(TestError::InvalidPair {
            test,
            dependent: dependent.name().to_string(),
            independent: independent.name().to_string(),
        });
    }
    Ok(())
}

/// The available tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    Pearson,
    Granger,
    Impact,
}

/// Names of the available tests
pub fn test_names() -> &'static [&'static str] {
    &["Pearson", "Granger", "Impact"]
}

impl TestKind {
    pub fn all() -> &'static [TestKind] {
        &[TestKind::Pearson, TestKind::Granger, TestKind::Impact]
    }

    pub fn name(&self) -> &'static str {
        match self {
            TestKind::Pearson => "Pearson",
            TestKind::Granger => "Granger",
            TestKind::Impact => "Impact",
        }
    }

    /// Smallest meaningful lag; causality at lag 0 is undefined
    pub fn min_lag(&self) -> usize {
        match self {
            TestKind::Granger => 1,
            TestKind::Pearson | TestKind::Impact => 0,
        }
    }

    /// Whether the test gives the same result both ways at lag 0
    pub fn is_symmetric(&self) -> bool {
        matches!(self, TestKind::Pearson)
    }

    /// Build the test for a pair; impact picks its binary variant when both
    /// series are binary
    pub fn build(&self, dependent: &Series, independent: &Series) -> Box<dyn LagTest> {
        match self {
            TestKind::Pearson => Box::new(PearsonTest),
            TestKind::Granger => Box::new(GrangerTest),
            TestKind::Impact => Box::new(ImpactTest::for_kinds(dependent.kind(), independent.kind())),
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TestKind {
    type Err = TestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pearson" | "linear regression" => Ok(TestKind::Pearson),
            "granger" | "granger causality" => Ok(TestKind::Granger),
            "impact" | "binary impact" | "continuous impact" => Ok(TestKind::Impact),
            _ => Err(TestError::UnknownTest(s.to_string())),
        }
    }
}

/// Which table of a series a test reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Window {
    /// The selection window
    Selected,
    /// The whole processed table
    Processed,
}

/// Values of both series on the dates they share, in date order, as
/// `(dependent, independent)`; holes become NaN
pub(crate) fn joint_values(dependent: &Series, independent: &Series, window: Window) -> (Vec<f64>, Vec<f64>) {
    let table = |series: &Series| -> BTreeMap<NaiveDate, Score> {
        match window {
            Window::Processed => series.processed().clone(),
            Window::Selected => series
                .selected_dates()
                .into_iter()
                .zip(series.selected_values())
                .collect(),
        }
    };
    let dep = table(dependent);
    let ind = table(independent);

    dep.iter()
        .filter_map(|(date, d)| ind.get(date).map(|i| (d.as_f64(), i.as_f64())))
        .unzip()
}

/// Split aligned values into `(x, y)` = (`independent[t]`, `dependent[t + lag]`)
pub(crate) fn lagged<'a>(dependent: &'a [f64], independent: &'a [f64], lag: usize) -> (&'a [f64], &'a [f64]) {
    let n = dependent.len().min(independent.len());
    if lag >= n {
        return (&[], &[]);
    }
    (&independent[..n - lag], &dependent[lag..n])
}

/// -1, 0 or 1 by the sign of a change; None for a change involving a hole
pub(crate) fn direction(delta: f64) -> Option<i8> {
    if delta.is_nan() {
        None
    } else if delta > 0.0 {
        Some(1)
    } else if delta < 0.0 {
        Some(-1)
    } else {
        Some(0)
    }
}
