//! All-pairs relationship matrix
//!
//! Row `i`, column `j` holds the effect size of series `j` (independent) on
//! series `i` (dependent) at a fixed lag, ready for a heatmap.

use serde::Serialize;
use tracing::debug;

use super::{LagOutcome, LagTest, TestKind};
use crate::series::{SharedSeries, VariableKind};

/// Effect sizes between every ordered pair of series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipMatrix {
    pub test: TestKind,
    pub lag: usize,
    pub names: Vec<String>,
    /// `values[dependent][independent]`
    pub values: Vec<Vec<f64>>,
}

/// One cell of the matrix in long form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixCell {
    pub x: String,
    pub y: String,
    pub value: f64,
}

impl RelationshipMatrix {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, dependent: usize, independent: usize) -> Option<f64> {
        self.values.get(dependent)?.get(independent).copied()
    }

    /// Unpivot into `(x, y, value)` cells, column by column
    pub fn to_long_form(&self) -> Vec<MatrixCell> {
        let mut cells = Vec::with_capacity(self.len() * self.len());
        for (j, column) in self.names.iter().enumerate() {
            for (i, row) in self.names.iter().enumerate() {
                cells.push(MatrixCell {
                    x: row.clone(),
                    y: column.clone(),
                    value: self.values[i][j],
                });
            }
        }
        cells
    }
}

/// Run `test` at `lag` between every ordered pair of `series`.
///
/// Pairs involving a time-of-day series stay 0. Pairs without enough data,
/// with a degenerate score, or without processed data are `NaN`. For a
/// symmetric test at lag 0 each unordered pair is computed once.
pub fn relationship_matrix(series: &[SharedSeries], test: TestKind, lag: usize) -> RelationshipMatrix {
    let n = series.len();
    let names: Vec<String> = series.iter().map(|s| s.borrow().name().to_string()).collect();
    let mut values = vec![vec![0.0; n]; n];
    let mirror = lag == 0 && test.is_symmetric();

    for i in 0..n {
        for j in 0..n {
            if mirror && j < i {
                values[i][j] = values[j][i];
                continue;
            }

            let dependent = series[i].borrow();
            let independent = series[j].borrow();
            if dependent.kind() == VariableKind::Time || independent.kind() == VariableKind::Time {
                continue;
            }

            let runner = test.build(&dependent, &independent);
            values[i][j] = match runner.run_for_lag(&dependent, &independent, lag) {
                Ok(LagOutcome::Scored(score)) if !score.is_invalid() => score.effect_size,
                Ok(_) => f64::NAN,
                Err(e) => {
                    debug!(
                        dependent = dependent.name(),
                        independent = independent.name(),
                        error = %e,
                        "Skipped matrix cell"
                    );
                    f64::NAN
                }
            };
        }
    }

    RelationshipMatrix {
        test,
        lag,
        names,
        values,
    }
}
