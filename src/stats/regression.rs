//! Least-squares helpers
//!
//! `linregress` is simple linear regression with a two-sided t-test on the
//! slope. `ols` solves a general design matrix through an SVD, which
//! tolerates rank-deficient designs (constant or duplicated lag columns).

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Singular values below this are treated as zero
const RANK_TOLERANCE: f64 = 1e-10;

/// Result of a simple linear regression of y on x
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient
    pub r: f64,
    /// Two-sided p-value for a zero slope
    pub p_value: f64,
    pub n: usize,
}

impl LinearFit {
    pub fn r_squared(&self) -> f64 {
        self.r * self.r
    }
}

/// Fit `y = slope * x + intercept`.
///
/// Returns None when fewer than three points are given, the lengths
/// differ, or x has no variance.
pub fn linregress(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    let n = x.len();
    if n < 3 || y.len() != n {
        return None;
    }

    let nf = n as f64;
    let x_mean = x.iter().sum::<f64>() / nf;
    let y_mean = y.iter().sum::<f64>() / nf;

    let (mut ss_x, mut ss_y, mut ss_xy) = (0.0, 0.0, 0.0);
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        ss_x += dx * dx;
        ss_y += dy * dy;
        ss_xy += dx * dy;
    }
    if ss_x == 0.0 || !ss_x.is_finite() {
        return None;
    }

    let r = if ss_y == 0.0 {
        0.0
    } else {
        (ss_xy / (ss_x * ss_y).sqrt()).clamp(-1.0, 1.0)
    };
    let slope = ss_xy / ss_x;
    let intercept = y_mean - slope * x_mean;

    let df = (n - 2) as f64;
    let p_value = if 1.0 - r.abs() < 1e-15 {
        0.0
    } else {
        let t = r * (df / ((1.0 - r) * (1.0 + r))).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df).ok()?;
        2.0 * (1.0 - dist.cdf(t.abs()))
    };

    Some(LinearFit {
        slope,
        intercept,
        r,
        p_value,
        n,
    })
}

/// Ordinary least squares fit of a design matrix
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub coefficients: DVector<f64>,
    /// Residual sum of squares
    pub rss: f64,
    /// Observations minus the rank of the design
    pub df_resid: usize,
}

/// Solve `design * beta = y` in the least-squares sense
pub fn ols(design: &DMatrix<f64>, y: &DVector<f64>) -> Option<OlsFit> {
    if design.nrows() != y.len() || design.nrows() == 0 {
        return None;
    }

    let svd = design.clone().svd(true, true);
    let rank = svd.rank(RANK_TOLERANCE);
    let coefficients = svd.solve(y, RANK_TOLERANCE).ok()?;
    let residuals = y - design * &coefficients;

    Some(OlsFit {
        rss: residuals.norm_squared(),
        df_resid: design.nrows().checked_sub(rank)?,
        coefficients,
    })
}
