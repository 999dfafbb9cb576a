//! Granger causality lag test
//!
//! For each lag L the dependent series is regressed on its own L previous
//! values (restricted model) and on those plus L previous values of the
//! independent series (unrestricted model). The F-test on the added
//! coefficients gives the p-value; the effect size is an eta-squared
//! transform of F.

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use tracing::debug;

use super::regression::ols;
use super::{
    check_preconditions, joint_values, LagOutcome, LagScore, LagTest, RangeOutcome, TestResult, Window,
};
use crate::series::Series;

#[derive(Debug, Clone, Copy, Default)]
pub struct GrangerTest;

impl GrangerTest {
    /// Score every lag in `[max(min_lag, 1), max_lag]` on the processed tables.
    ///
    /// When the data cannot support `max_lag` lags (`n <= 3 * max_lag + 1`),
    /// `max_lag` is lowered until it can; if no lag remains the outcome is
    /// insufficient. Series with holes are insufficient as well.
    pub fn run_lags(&self, dependent: &Series, independent: &Series, min_lag: usize, max_lag: usize) -> RangeOutcome {
        if max_lag == 0 {
            return RangeOutcome::insufficient("Granger causality needs a lag of at least one period");
        }

        let (y, x) = joint_values(dependent, independent, Window::Processed);
        if y.iter().chain(&x).any(|v| !v.is_finite()) {
            return RangeOutcome::insufficient("Granger causality cannot run on data with missing values");
        }

        let n = y.len();
        let mut usable = max_lag;
        while usable > 0 && n <= 3 * usable + 1 {
            usable -= 1;
        }
        if usable == 0 {
            return RangeOutcome::insufficient(format!(
                "Not enough data to run Granger causality test ({} shared points)",
                n
            ));
        }
        if usable < max_lag {
            debug!(requested = max_lag, usable, points = n, "Lowered Granger max lag");
        }

        let scores: Vec<LagScore> = (min_lag.max(1)..=usable)
            .map(|lag| f_test(&y, &x, lag))
            .collect();
        RangeOutcome::from_scores(&scores)
    }
}

impl LagTest for GrangerTest {
    fn name(&self) -> &'static str {
        "Granger"
    }

    fn display_name(&self) -> &'static str {
        "Granger Causality"
    }

    fn is_symmetric(&self) -> bool {
        false
    }

    /// Score at `lag`, or at the largest lag the data supports below it
    fn run_valid_for_lag(&self, dependent: &Series, independent: &Series, lag: usize) -> LagOutcome {
        match self.run_lags(dependent, independent, 1, lag) {
            RangeOutcome::Insufficient { reason } => LagOutcome::Insufficient { reason },
            scored => match scored.scores().last() {
                Some(score) => LagOutcome::Scored(*score),
                None => LagOutcome::insufficient("No lag could be tested"),
            },
        }
    }

    /// Granger computes every lag through `max_lag` in one pass, so the
    /// window here includes `max_lag`
    fn run_over_range(
        &self,
        dependent: &Series,
        independent: &Series,
        min_lag: usize,
        max_lag: usize,
    ) -> TestResult<RangeOutcome> {
        check_preconditions(self.name(), dependent, independent)?;
        Ok(self.run_lags(dependent, independent, min_lag, max_lag))
    }
}

/// F-test of `x` lags improving the prediction of `y` at one lag
fn f_test(y: &[f64], x: &[f64], lag: usize) -> LagScore {
    let n = y.len();
    let rows = n - lag;

    // Row r describes t = r + lag: own lags, then cause lags, then a constant
    let own = DMatrix::from_fn(rows, lag + 1, |r, c| if c < lag { y[r + lag - 1 - c] } else { 1.0 });
    let joint = DMatrix::from_fn(rows, 2 * lag + 1, |r, c| {
        if c < lag {
            y[r + lag - 1 - c]
        } else if c < 2 * lag {
            x[r + 2 * lag - 1 - c]
        } else {
            1.0
        }
    });
    let target = DVector::from_column_slice(&y[lag..]);

    let (Some(restricted), Some(unrestricted)) = (ols(&own, &target), ols(&joint, &target)) else {
        return LagScore::invalid(lag);
    };
    let df_denom = unrestricted.df_resid;
    if df_denom == 0 {
        return LagScore::invalid(lag);
    }

    let f = ((restricted.rss - unrestricted.rss) / lag as f64) / (unrestricted.rss / df_denom as f64);
    if !f.is_finite() {
        return LagScore::invalid(lag);
    }
    let f = f.max(0.0);

    let p_value = match FisherSnedecor::new(lag as f64, df_denom as f64) {
        Ok(dist) => 1.0 - dist.cdf(f),
        Err(_) => return LagScore::invalid(lag),
    };

    LagScore::new(lag, eta_squared(f, df_denom as f64, n as f64), p_value)
}

/// `F * (df - 1) / (F * (df - 1) + (N - df))`
fn eta_squared(f: f64, df_denom: f64, n: f64) -> f64 {
    let scaled = f * (df_denom - 1.0);
    scaled / (scaled + (n - df_denom))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{FillStrategy, Provenance, Score, VariableKind};
    use chrono::{Duration, NaiveDate};

    fn series(name: &str, values: &[f64]) -> Series {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Series::from_rows(
            name,
            VariableKind::Continuous,
            Provenance::Habit,
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (start + Duration::days(i as i64), Score::Value(*v))),
        )
    }

    /// y follows x one day later, plus deterministic noise
    fn causal_pair() -> (Series, Series) {
        let n = 40;
        let x: Vec<f64> = (0..n).map(|t| ((t * 7919) % 23) as f64).collect();
        let noise: Vec<f64> = (0..n).map(|t| ((t * 104_729) % 17) as f64 - 8.0).collect();
        let mut y = vec![0.0];
        y.extend((1..n).map(|t| x[t - 1] + 0.5 * noise[t]));
        (series("effect", &y), series("cause", &x))
    }

    #[test]
    fn test_detects_lagged_cause() {
        let (effect, cause) = causal_pair();
        let outcome = GrangerTest.run_over_range(&effect, &cause, 0, 2).unwrap();

        let scores = outcome.scores();
        assert_eq!(scores.iter().map(|s| s.lag).collect::<Vec<_>>(), vec![1, 2]);
        assert!(scores[0].p_value < 1e-12);
        // F = 262.9 on (1, 36), N = 40
        assert!((scores[0].effect_size - 0.99957).abs() < 1e-4);
    }

    #[test]
    fn test_reverse_direction_weaker() {
        let (effect, cause) = causal_pair();
        let outcome = GrangerTest.run_over_range(&cause, &effect, 2, 2).unwrap();

        let scores = outcome.scores();
        assert_eq!(scores.len(), 1);
        assert!(scores[0].p_value > 0.05);
    }

    #[test]
    fn test_short_data_never_panics() {
        let a = series("a", &[1.0, 3.0, 2.0, 4.0]);
        let b = series("b", &[2.0, 1.0, 4.0, 3.0]);

        let outcome = GrangerTest.run_over_range(&a, &b, 0, 3).unwrap();
        assert!(matches!(outcome, RangeOutcome::Insufficient { .. }));
        assert!(matches!(
            GrangerTest.run_for_lag(&a, &b, 3).unwrap(),
            LagOutcome::Insufficient { .. }
        ));
    }

    #[test]
    fn test_max_lag_lowered_to_fit_data() {
        // n = 8 supports two lags but not three
        let a = series("a", &[1.0, 3.0, 2.0, 4.0, 6.0, 5.0, 8.0, 7.0]);
        let b = series("b", &[2.0, 1.0, 4.0, 3.0, 5.0, 7.0, 6.0, 9.0]);

        let outcome = GrangerTest.run_over_range(&a, &b, 1, 3).unwrap();
        let lags: Vec<usize> = outcome.scores().iter().map(|s| s.lag).collect();
        assert_eq!(lags, vec![1, 2]);

        let single = GrangerTest.run_for_lag(&a, &b, 3).unwrap();
        assert_eq!(single.score().map(|s| s.lag), Some(2));
    }

    #[test]
    fn test_lag_zero_is_insufficient() {
        let (effect, cause) = causal_pair();
        assert!(matches!(
            GrangerTest.run_for_lag(&effect, &cause, 0).unwrap(),
            LagOutcome::Insufficient { .. }
        ));
    }

    #[test]
    fn test_missing_values_insufficient() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut gappy = Series::from_rows(
            "gappy",
            VariableKind::Continuous,
            Provenance::Habit,
            [0, 1, 2, 5, 6, 7, 8, 9, 10, 11, 12]
                .iter()
                .map(|d| (start + Duration::days(*d), Score::Value(*d as f64 % 3.0))),
        );
        gappy.set_fill_strategy(FillStrategy::NoFill).unwrap();
        let (effect, _) = causal_pair();

        let outcome = GrangerTest.run_over_range(&effect, &gappy, 1, 1).unwrap();
        assert!(matches!(outcome, RangeOutcome::Insufficient { .. }));
    }

    #[test]
    fn test_constant_series_is_sentinel() {
        let flat = series("flat", &[2.0; 12]);
        let outcome = GrangerTest.run_over_range(&flat, &flat, 1, 1).unwrap();
        assert!(outcome.scores()[0].is_invalid());
    }

    #[test]
    fn test_eta_squared() {
        assert_eq!(eta_squared(0.0, 10.0, 20.0), 0.0);
        assert!((eta_squared(4.0, 11.0, 15.0) - 40.0 / 44.0).abs() < 1e-12);
    }
}
