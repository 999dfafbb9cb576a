//! Pearson (linear regression) lag test

use super::regression::linregress;
use super::{joint_values, lagged, LagOutcome, LagScore, LagTest, Window};
use crate::series::Series;

/// Regress `dependent[t + lag]` on `independent[t]` over the selection.
///
/// Effect size is R², significance the regression p-value. Pairs with a
/// hole on either side are skipped; degenerate input (under three pairs, a
/// flat independent series) scores the invalid sentinel on both numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct PearsonTest;

impl LagTest for PearsonTest {
    fn name(&self) -> &'static str {
        "Pearson"
    }

    fn display_name(&self) -> &'static str {
        "Linear Regression"
    }

    fn is_symmetric(&self) -> bool {
        true
    }

    fn run_valid_for_lag(&self, dependent: &Series, independent: &Series, lag: usize) -> LagOutcome {
        let (dep, ind) = joint_values(dependent, independent, Window::Selected);
        let (x, y) = lagged(&dep, &ind, lag);

        let (x, y): (Vec<f64>, Vec<f64>) = x
            .iter()
            .zip(y)
            .filter(|(a, b)| a.is_finite() && b.is_finite())
            .map(|(a, b)| (*a, *b))
            .unzip();

        let score = match linregress(&x, &y) {
            Some(fit) => LagScore::new(lag, fit.r_squared(), fit.p_value),
            None => LagScore::invalid(lag),
        };
        LagOutcome::Scored(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{FillStrategy, Provenance, Score, VariableKind};
    use chrono::{Duration, NaiveDate};

    fn series(name: &str, values: &[f64]) -> Series {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
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

    #[test]
    fn test_perfect_linear_relationship() {
        let x: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 2.0).collect();
        let (dep, ind) = (series("y", &y), series("x", &x));

        let score = *PearsonTest.run_for_lag(&dep, &ind, 0).unwrap().score().unwrap();
        assert!((score.effect_size - 1.0).abs() < 1e-9);
        assert!(score.p_value < 1e-6);
        assert_eq!(score.lag, 0);
    }

    #[test]
    fn test_lag_shifts_dependent_forward() {
        // y copies x two days later
        let x = [1.0, 5.0, 2.0, 8.0, 3.0, 9.0, 4.0, 7.0, 6.0, 2.0];
        let mut y = vec![0.0, 0.0];
        y.extend_from_slice(&x[..8]);
        let (dep, ind) = (series("y", &y), series("x", &x));

        let at_two = *PearsonTest.run_for_lag(&dep, &ind, 2).unwrap().score().unwrap();
        assert!((at_two.effect_size - 1.0).abs() < 1e-9);

        let at_zero = *PearsonTest.run_for_lag(&dep, &ind, 0).unwrap().score().unwrap();
        assert!(at_zero.effect_size < 0.5);
    }

    #[test]
    fn test_symmetric_at_lag_zero() {
        let a = series("a", &[1.0, 3.0, 2.0, 5.0, 4.0, 6.0]);
        let b = series("b", &[2.0, 2.0, 3.0, 6.0, 5.0, 5.0]);

        let ab = *PearsonTest.run_for_lag(&a, &b, 0).unwrap().score().unwrap();
        let ba = *PearsonTest.run_for_lag(&b, &a, 0).unwrap().score().unwrap();
        assert!((ab.effect_size - ba.effect_size).abs() < 1e-12);
        assert!((ab.p_value - ba.p_value).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_input_is_sentinel() {
        let flat = series("flat", &[4.0; 6]);
        let other = series("other", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let score = *PearsonTest.run_for_lag(&other, &flat, 0).unwrap().score().unwrap();
        assert!(score.is_invalid());

        // Lag longer than the data
        let score = *PearsonTest.run_for_lag(&other, &other, 10).unwrap().score().unwrap();
        assert!(score.is_invalid());
    }

    #[test]
    fn test_holes_skipped() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let rows = [(0, 1.0), (1, 2.0), (3, 4.0), (4, 5.0), (5, 6.0)];
        let mut gappy = Series::from_rows(
            "gappy",
            VariableKind::Continuous,
            Provenance::Habit,
            rows.iter().map(|(d, v)| (start + Duration::days(*d), Score::Value(*v))),
        );
        gappy.set_fill_strategy(FillStrategy::NoFill).unwrap();
        let full = series("full", &[2.0, 4.0, 100.0, 8.0, 10.0, 12.0]);

        let score = *PearsonTest.run_for_lag(&full, &gappy, 0).unwrap().score().unwrap();
        assert!((score.effect_size - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_over_range() {
        let x: Vec<f64> = (1..=10).map(|v| (v * v) as f64).collect();
        let dep = series("y", &x);
        let outcome = PearsonTest.run_over_range(&dep, &dep, 0, 3).unwrap();

        let scores = outcome.scores();
        assert_eq!(scores.iter().map(|s| s.lag).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!((scores[0].effect_size - 1.0).abs() < 1e-9);
    }
}
