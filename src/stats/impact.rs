//! Directional "impact" heuristics
//!
//! These do not fit a model. They count how often the dependent series moves
//! in a particular direction after the independent series does something,
//! and scale the result to -1..1. No p-value is defined.

use super::{direction, joint_values, LagOutcome, LagScore, LagTest, Window, INVALID};
use crate::series::{Series, VariableKind};

/// Fewest days after the lag for the continuous variant
const MIN_CONTINUOUS_POINTS: usize = 3;
/// Fewest comparisons for the binary variant
const MIN_BINARY_COMPARISONS: usize = 5;

/// Agreement between the directions of change of both series.
///
/// Compares `sign(x[t] - x[t-1])` with `sign(y[t+lag] - y[t+lag-1])` and
/// divides the agreements by `n - lag`, the days left after the lag. The
/// first of those days has no predecessor, so even perfect agreement scores
/// a little under 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinuousImpactTest;

impl LagTest for ContinuousImpactTest {
    fn name(&self) -> &'static str {
        "Impact"
    }

    fn display_name(&self) -> &'static str {
        "Impact"
    }

    fn is_symmetric(&self) -> bool {
        false
    }

    fn run_valid_for_lag(&self, dependent: &Series, independent: &Series, lag: usize) -> LagOutcome {
        let (dep, ind) = joint_values(dependent, independent, Window::Selected);
        let n = dep.len().min(ind.len());
        let days = n.saturating_sub(lag);
        if days < MIN_CONTINUOUS_POINTS {
            return LagOutcome::insufficient(format!(
                "Not enough data for impact at lag {}: need at least {} points after the lag",
                lag, MIN_CONTINUOUS_POINTS
            ));
        }

        let mut comparisons = 0usize;
        let mut agreements = 0usize;
        for t in 1..days {
            let cause = direction(ind[t] - ind[t - 1]);
            let effect = direction(dep[t + lag] - dep[t + lag - 1]);
            if let (Some(cause), Some(effect)) = (cause, effect) {
                comparisons += 1;
                if cause == effect {
                    agreements += 1;
                }
            }
        }
        if comparisons == 0 {
            return LagOutcome::insufficient("No comparable days without missing values");
        }

        let agreement = agreements as f64 / days as f64;
        LagOutcome::Scored(LagScore::new(lag, 2.0 * (agreement - 0.5), INVALID))
    }
}

/// Direction of change of the dependent series on days the independent
/// series is zero versus non-zero.
///
/// Each bucket's mean signed change lies in -1..1; the score is half their
/// difference, positive when non-zero days are followed by increases.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryImpactTest;

impl LagTest for BinaryImpactTest {
    fn name(&self) -> &'static str {
        "Impact"
    }

    fn display_name(&self) -> &'static str {
        "Binary Impact"
    }

    fn is_symmetric(&self) -> bool {
        false
    }

    fn run_valid_for_lag(&self, dependent: &Series, independent: &Series, lag: usize) -> LagOutcome {
        let (dep, ind) = joint_values(dependent, independent, Window::Selected);
        let n = dep.len().min(ind.len());

        let (mut zero_count, mut zero_changes) = (0usize, 0i64);
        let (mut nonzero_count, mut nonzero_changes) = (0usize, 0i64);
        for t in 1..n.saturating_sub(lag) {
            let cause = ind[t];
            let Some(change) = direction(dep[t + lag] - dep[t + lag - 1]) else {
                continue;
            };
            if !cause.is_finite() {
                continue;
            }
            if cause == 0.0 {
                zero_count += 1;
                zero_changes += change as i64;
            } else {
                nonzero_count += 1;
                nonzero_changes += change as i64;
            }
        }

        if zero_count + nonzero_count < MIN_BINARY_COMPARISONS {
            return LagOutcome::insufficient(format!(
                "Not enough data for binary impact at lag {}: need at least {} comparisons",
                lag, MIN_BINARY_COMPARISONS
            ));
        }
        if zero_count == 0 || nonzero_count == 0 {
            return LagOutcome::insufficient(
                "Binary impact needs days both with and without the independent variable",
            );
        }

        let zero_rate = zero_changes as f64 / zero_count as f64;
        let nonzero_rate = nonzero_changes as f64 / nonzero_count as f64;
        LagOutcome::Scored(LagScore::new(lag, (nonzero_rate - zero_rate) / 2.0, INVALID))
    }
}

/// Impact test matched to the kinds of a pair
#[derive(Debug, Clone, Copy)]
pub enum ImpactTest {
    Continuous(ContinuousImpactTest),
    Binary(BinaryImpactTest),
}

impl ImpactTest {
    /// Binary variant only when both series are binary
    pub fn for_kinds(dependent: VariableKind, independent: VariableKind) -> Self {
        if dependent == VariableKind::Binary && independent == VariableKind::Binary {
            ImpactTest::Binary(BinaryImpactTest)
        } else {
            ImpactTest::Continuous(ContinuousImpactTest)
        }
    }

    pub fn for_series(dependent: &Series, independent: &Series) -> Self {
        Self::for_kinds(dependent.kind(), independent.kind())
    }

    fn inner(&self) -> &dyn LagTest {
        match self {
            ImpactTest::Continuous(test) => test,
            ImpactTest::Binary(test) => test,
        }
    }
}

impl LagTest for ImpactTest {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn display_name(&self) -> &'static str {
        self.inner().display_name()
    }

    fn is_symmetric(&self) -> bool {
        self.inner().is_symmetric()
    }

    fn run_valid_for_lag(&self, dependent: &Series, independent: &Series, lag: usize) -> LagOutcome {
        self.inner().run_valid_for_lag(dependent, independent, lag)
    }
}
