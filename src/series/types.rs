//! Core value types for the series pipeline
//!
//! This module defines the small value types everything else is built on:
//! - `Score`: one day's reading (number, time of day, or an explicit gap)
//! - `Observation`: a raw logged reading
//! - `DateRange`: an inclusive span of calendar days
//! - `FillStrategy`, `GroupingMethod`, `Frequency`: processing policies
//! - `Provenance`: which source produced a series

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::SeriesError;
use super::kind::VariableKind;

/// Value recorded for a single calendar day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Score {
    /// Numeric reading (continuous, binary 0/1, or a duration in seconds)
    Value(f64),
    /// Time-of-day reading (bedtime, wake-up time)
    TimeOfDay(NaiveTime),
    /// Explicit hole left by `FillStrategy::NoFill`
    Missing,
}

impl Score {
    /// True for `Missing` and for non-finite numbers
    pub fn is_missing(&self) -> bool {
        match self {
            Score::Value(v) => !v.is_finite(),
            Score::TimeOfDay(_) => false,
            Score::Missing => true,
        }
    }

    /// Numeric view of the score: the number itself, seconds since midnight
    /// for a time of day, `NaN` for a gap
    pub fn as_f64(&self) -> f64 {
        match self {
            Score::Value(v) => *v,
            Score::TimeOfDay(t) => t.num_seconds_from_midnight() as f64,
            Score::Missing => f64::NAN,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            Score::TimeOfDay(t) => Some(*t),
            _ => None,
        }
    }

    /// Whether this score can be stored in a series of the given kind
    pub fn fits(&self, kind: VariableKind) -> bool {
        match self {
            Score::Value(_) => kind != VariableKind::Time,
            Score::TimeOfDay(_) => kind == VariableKind::Time,
            Score::Missing => true,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Value(v) => write!(f, "{:.2}", v),
            Score::TimeOfDay(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Score::Missing => write!(f, "-"),
        }
    }
}

/// A single raw reading as logged or imported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    /// Time the entry was logged, for panels that track it
    #[serde(default)]
    pub time: Option<NaiveTime>,
    pub score: Score,
}

impl Observation {
    pub fn new(date: NaiveDate, score: Score) -> Self {
        Self {
            date,
            time: None,
            score,
        }
    }

    /// Builder method: attach the time of logging
    pub fn at(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self
    }
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Date range from bounds already known to be ordered. Outside the
    /// crate, use `try_new`.
    ///
    /// # Panics
    /// Panics if start > end
    pub(crate) fn new(start: NaiveDate, end: NaiveDate) -> Self {
        assert!(start <= end, "DateRange: start must not be after end");
        Self { start, end }
    }

    /// Create a date range, returning None if start is after end
    pub fn try_new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        if start <= end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Number of calendar days covered, both ends included
    pub fn num_days(&self) -> usize {
        ((self.end - self.start).num_days() + 1) as usize
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Iterate over every day in the range
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..self.num_days() as i64).map(move |offset| start + Duration::days(offset))
    }

    /// Get intersection with another range, if any
    pub fn intersection(&self, other: &DateRange) -> Option<Self> {
        Self::try_new(self.start.max(other.start), self.end.min(other.end))
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.intersection(other).is_some()
    }

    /// Move the start back by `days`, keeping the end
    pub fn extend_back(&self, days: i64) -> Self {
        Self {
            start: self.start - Duration::days(days),
            end: self.end,
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// How to assign values to days without a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStrategy {
    ZerosFill,
    MeanExcludingMissing,
    MeanIncludingMissing,
    ForwardFill,
    BackwardFill,
    NoFill,
}

impl FillStrategy {
    pub fn all() -> &'static [FillStrategy] {
        &[
            FillStrategy::ZerosFill,
            FillStrategy::MeanIncludingMissing,
            FillStrategy::MeanExcludingMissing,
            FillStrategy::ForwardFill,
            FillStrategy::BackwardFill,
            FillStrategy::NoFill,
        ]
    }

    /// Strategies that make sense for a variable kind
    ///
    /// Time-of-day readings cannot be filled with zeros.
    pub fn supported_for(kind: VariableKind) -> &'static [FillStrategy] {
        match kind {
            VariableKind::Time => &[
                FillStrategy::MeanExcludingMissing,
                FillStrategy::MeanIncludingMissing,
                FillStrategy::ForwardFill,
                FillStrategy::BackwardFill,
                FillStrategy::NoFill,
            ],
            _ => Self::all(),
        }
    }

    /// Default strategy for a freshly built series
    pub fn default_for(kind: VariableKind) -> Self {
        match kind {
            VariableKind::Time => FillStrategy::MeanExcludingMissing,
            _ => FillStrategy::ZerosFill,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FillStrategy::ZerosFill => "Fill with Zeros",
            FillStrategy::MeanExcludingMissing => "Fill with Mean Excluding Missing Values",
            FillStrategy::MeanIncludingMissing => "Fill with Mean Including Missing Values",
            FillStrategy::ForwardFill => "Forward Fill",
            FillStrategy::BackwardFill => "Back Fill",
            FillStrategy::NoFill => "Don't Fill",
        }
    }

    fn key(&self) -> &'static str {
        match self {
            FillStrategy::ZerosFill => "zeros",
            FillStrategy::MeanExcludingMissing => "mean_excluding",
            FillStrategy::MeanIncludingMissing => "mean_including",
            FillStrategy::ForwardFill => "forward",
            FillStrategy::BackwardFill => "backward",
            FillStrategy::NoFill => "none",
        }
    }
}

impl fmt::Display for FillStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FillStrategy {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::all()
            .iter()
            .copied()
            .find(|strategy| strategy.label().eq_ignore_ascii_case(s) || strategy.key() == s)
            .ok_or_else(|| SeriesError::UnknownPolicy {
                policy: "fill strategy",
                value: s.to_string(),
            })
    }
}

/// How daily values are combined into weekly or monthly buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMethod {
    Average,
    Sum,
}

impl GroupingMethod {
    pub fn all() -> &'static [GroupingMethod] {
        &[GroupingMethod::Average, GroupingMethod::Sum]
    }

    /// Circular time has no meaningful sum
    pub fn supported_for(kind: VariableKind) -> &'static [GroupingMethod] {
        match kind {
            VariableKind::Time => &[GroupingMethod::Average],
            _ => Self::all(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GroupingMethod::Average => "Average Values",
            GroupingMethod::Sum => "Sum Values",
        }
    }
}

impl fmt::Display for GroupingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GroupingMethod {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "average" | "avg" | "mean" | "average values" => Ok(GroupingMethod::Average),
            "sum" | "sum values" => Ok(GroupingMethod::Sum),
            other => Err(SeriesError::UnknownPolicy {
                policy: "grouping method",
                value: other.to_string(),
            }),
        }
    }
}

/// Resampling granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    /// Reserved; resampling treats it like `Daily`
    Yearly,
}

impl Frequency {
    /// Frequencies offered for analysis
    pub fn all() -> &'static [Frequency] {
        &[Frequency::Daily, Frequency::Weekly, Frequency::Monthly]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Monthly => "Monthly",
            Frequency::Yearly => "Yearly",
        }
    }

    /// Unit name used when reporting lags ("Lag = 2 Weeks")
    pub fn quantity_label(&self) -> &'static str {
        match self {
            Frequency::Daily => "Days",
            Frequency::Weekly => "Weeks",
            Frequency::Monthly => "Months",
            Frequency::Yearly => "Years",
        }
    }

    /// Days to move a selection start back so the first bucket is not cut off
    pub fn selection_offset(&self, start: NaiveDate) -> i64 {
        match self {
            Frequency::Weekly => 6,
            Frequency::Monthly => start.day() as i64 - 1,
            Frequency::Daily | Frequency::Yearly => 0,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Frequency {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "day" | "d" => Ok(Frequency::Daily),
            "weekly" | "week" | "w" => Ok(Frequency::Weekly),
            "monthly" | "month" | "m" => Ok(Frequency::Monthly),
            "yearly" | "year" | "y" => Ok(Frequency::Yearly),
            other => Err(SeriesError::UnknownPolicy {
                policy: "frequency",
                value: other.to_string(),
            }),
        }
    }
}

/// Ring export sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RingCategory {
    Readiness,
    Sleep,
    Activity,
}

impl RingCategory {
    pub fn all() -> &'static [RingCategory] {
        &[
            RingCategory::Readiness,
            RingCategory::Sleep,
            RingCategory::Activity,
        ]
    }

    pub fn key(&self) -> &'static str {
        match self {
            RingCategory::Readiness => "readiness",
            RingCategory::Sleep => "sleep",
            RingCategory::Activity => "activity",
        }
    }
}

/// Which adapter produced a series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Logged by hand through a panel
    Manual { panel: String },
    /// Wearable ring export
    Ring { category: RingCategory },
    /// Nutrition-app export
    Nutrition,
    /// Habit-tracker export
    Habit,
}

impl Provenance {
    /// Registry category the series is filed under
    pub fn category_name(&self) -> &str {
        match self {
            Provenance::Manual { panel } => panel,
            Provenance::Ring { .. } => "Oura Ring",
            Provenance::Nutrition => "MyFitnessPal",
            Provenance::Habit => "HabitBull",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_days() {
        let range = DateRange::new(date(2024, 1, 30), date(2024, 2, 2));
        let days: Vec<_> = range.days().collect();

        assert_eq!(range.num_days(), 4);
        assert_eq!(days.first(), Some(&date(2024, 1, 30)));
        assert_eq!(days.last(), Some(&date(2024, 2, 2)));
        assert!(range.contains(date(2024, 2, 1)));
        assert!(!range.contains(date(2024, 2, 3)));
    }

    #[test]
    fn test_date_range_intersection() {
        let a = DateRange::new(date(2024, 1, 1), date(2024, 1, 10));
        let b = DateRange::new(date(2024, 1, 5), date(2024, 1, 20));
        let c = DateRange::new(date(2024, 2, 1), date(2024, 2, 5));

        assert_eq!(
            a.intersection(&b),
            Some(DateRange::new(date(2024, 1, 5), date(2024, 1, 10)))
        );
        assert!(a.intersection(&c).is_none());
        assert!(!a.overlaps(&c));
        assert!(DateRange::try_new(date(2024, 1, 2), date(2024, 1, 1)).is_none());
    }

    #[test]
    fn test_try_new_accepts_single_day() {
        let day = date(2024, 1, 2);
        assert_eq!(DateRange::try_new(day, day), Some(DateRange::new(day, day)));
        assert_eq!(DateRange::try_new(day, day).map(|r| r.num_days()), Some(1));
    }

    #[test]
    #[should_panic(expected = "start must not be after end")]
    fn test_new_rejects_reversed_bounds() {
        DateRange::new(date(2024, 1, 2), date(2024, 1, 1));
    }

    #[test]
    fn test_score_missing() {
        assert!(Score::Missing.is_missing());
        assert!(Score::Value(f64::NAN).is_missing());
        assert!(!Score::Value(0.0).is_missing());
        assert!(Score::Missing.as_f64().is_nan());

        let t = NaiveTime::from_hms_opt(1, 0, 30).unwrap();
        assert_eq!(Score::TimeOfDay(t).as_f64(), 3630.0);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "Forward Fill".parse::<FillStrategy>().unwrap(),
            FillStrategy::ForwardFill
        );
        assert_eq!("none".parse::<FillStrategy>().unwrap(), FillStrategy::NoFill);
        assert!("sideways".parse::<FillStrategy>().is_err());

        assert_eq!("Sum Values".parse::<GroupingMethod>().unwrap(), GroupingMethod::Sum);
        assert_eq!("weekly".parse::<Frequency>().unwrap(), Frequency::Weekly);
    }

    #[test]
    fn test_time_kind_restrictions() {
        assert!(!FillStrategy::supported_for(VariableKind::Time).contains(&FillStrategy::ZerosFill));
        assert!(!GroupingMethod::supported_for(VariableKind::Time).contains(&GroupingMethod::Sum));
        assert_eq!(GroupingMethod::supported_for(VariableKind::Binary).len(), 2);
    }

    #[test]
    fn test_selection_offset() {
        assert_eq!(Frequency::Daily.selection_offset(date(2024, 3, 14)), 0);
        assert_eq!(Frequency::Weekly.selection_offset(date(2024, 3, 14)), 6);
        assert_eq!(Frequency::Monthly.selection_offset(date(2024, 3, 14)), 13);
    }
}
