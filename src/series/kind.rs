//! Variable kinds and their statistics
//!
//! A series' kind is fixed at construction and decides how "mean" and
//! "spread" are computed. Continuous, binary and duration series use plain
//! arithmetic. Time-of-day series use a wrapped-seconds representation so
//! readings on both sides of midnight average sensibly.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::Score;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Kind of variable a series tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    /// Arbitrary numeric readings (mood 1-10, steps)
    Continuous,
    /// 0/1 readings; the mean reads as a frequency
    Binary,
    /// Time-of-day readings (bedtime, wake-up time)
    Time,
    /// Lengths of time in seconds; unit conversion is left to the caller
    Duration,
}

impl VariableKind {
    pub fn all() -> &'static [VariableKind] {
        &[
            VariableKind::Continuous,
            VariableKind::Binary,
            VariableKind::Time,
            VariableKind::Duration,
        ]
    }

    /// Whether lag tests can run on series of this kind
    pub fn is_numeric(&self) -> bool {
        !matches!(self, VariableKind::Time)
    }

    /// Mean of the non-missing scores, `Score::Missing` if there are none
    pub fn mean_of(&self, data: &[Score]) -> Score {
        match self {
            VariableKind::Time => match wrapped_seconds(data) {
                Some(secs) => mean(&secs).map(seconds_to_score).unwrap_or(Score::Missing),
                None => Score::Missing,
            },
            _ => mean(&numeric_values(data))
                .map(Score::Value)
                .unwrap_or(Score::Missing),
        }
    }

    /// Population standard deviation of the non-missing scores
    ///
    /// For time-of-day series this is the linear spread of the wrapped
    /// seconds, reported as a time of day.
    pub fn stdev_of(&self, data: &[Score]) -> Score {
        match self {
            VariableKind::Time => match wrapped_seconds(data) {
                Some(secs) => population_stdev(&secs)
                    .map(seconds_to_score)
                    .unwrap_or(Score::Missing),
                None => Score::Missing,
            },
            _ => population_stdev(&numeric_values(data))
                .map(Score::Value)
                .unwrap_or(Score::Missing),
        }
    }

    /// Mean formatted for display: two decimals, or `HH:MM:SS` for times
    pub fn mean_string_of(&self, data: &[Score]) -> String {
        self.mean_of(data).to_string()
    }

    pub fn stdev_string_of(&self, data: &[Score]) -> String {
        self.stdev_of(data).to_string()
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableKind::Continuous => write!(f, "continuous"),
            VariableKind::Binary => write!(f, "binary"),
            VariableKind::Time => write!(f, "time"),
            VariableKind::Duration => write!(f, "duration"),
        }
    }
}

/// Arithmetic mean, None for an empty slice
pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population (ddof = 0) standard deviation
pub(crate) fn population_stdev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

fn numeric_values(data: &[Score]) -> Vec<f64> {
    data.iter()
        .filter_map(|s| match s {
            Score::Value(v) if v.is_finite() => Some(*v),
            _ => None,
        })
        .collect()
}

/// Convert times of day to seconds past a common midnight.
///
/// Readings from 00:00 to 06:59 count as belonging to the next day, but only
/// when the readings span from at most 01:xx to at least 23:xx, i.e. when
/// there is evidence that they wrap around midnight.
fn wrapped_seconds(data: &[Score]) -> Option<Vec<f64>> {
    let times: Vec<NaiveTime> = data.iter().filter_map(Score::as_time).collect();
    let min_hour = times.iter().map(|t| t.hour()).min()?;
    let max_hour = times.iter().map(|t| t.hour()).max()?;
    let wraps = min_hour <= 1 && max_hour >= 23;

    Some(
        times
            .iter()
            .map(|t| {
                let secs = t.num_seconds_from_midnight() as f64;
                if wraps && t.hour() <= 6 {
                    secs + SECONDS_PER_DAY
                } else {
                    secs
                }
            })
            .collect(),
    )
}

fn seconds_to_score(secs: f64) -> Score {
    // Truncate to whole seconds and wrap back into a single day
    let whole = (secs.trunc() as i64).rem_euclid(SECONDS_PER_DAY as i64) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(whole, 0)
        .map(Score::TimeOfDay)
        .unwrap_or(Score::Missing)
}
