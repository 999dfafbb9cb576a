//! The `Series` entity
//!
//! A series keeps every raw observation it was built from and a processed
//! table derived from them. The processed table is always rebuilt from raw
//! data (duplicate merge, reindex-and-fill, resample) whenever a policy or
//! the requested range changes, so two recomputations with the same settings
//! produce identical tables.

use chrono::{NaiveDate, NaiveTime};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use super::error::{SeriesError, SeriesResult};
use super::fill::{self, DailyTable};
use super::kind::VariableKind;
use super::resample;
use super::types::{DateRange, FillStrategy, Frequency, GroupingMethod, Observation, Provenance, Score};

/// Minimum processed points for a series to take part in analysis
pub const MIN_ANALYZABLE_POINTS: usize = 3;

/// One tracked variable and its current processing configuration
#[derive(Debug, Clone)]
pub struct Series {
    name: String,
    kind: VariableKind,
    provenance: Provenance,
    /// Raw readings ordered by date, duplicates kept
    raw: Vec<Observation>,
    fill: FillStrategy,
    frequency: Frequency,
    grouping: GroupingMethod,
    /// Day range the processed table was built over
    processed_range: Option<DateRange>,
    /// Window chosen for display and analysis
    selected_range: Option<DateRange>,
    processed: DailyTable,
}

impl Series {
    /// Build a series from raw observations.
    ///
    /// Missing readings and readings of the wrong shape for `kind` are
    /// dropped. The processed table is immediately built over the raw span
    /// with the kind's default fill strategy at daily frequency.
    pub fn new(
        name: impl Into<String>,
        kind: VariableKind,
        provenance: Provenance,
        observations: Vec<Observation>,
    ) -> Self {
        let name = name.into();
        let total = observations.len();
        let mut raw: Vec<Observation> = observations
            .into_iter()
            .filter(|obs| !obs.score.is_missing() && obs.score.fits(kind))
            .collect();
        if raw.len() < total {
            warn!(
                series = %name,
                dropped = total - raw.len(),
                "Dropped missing or mismatched readings"
            );
        }
        raw.sort_by_key(|obs| obs.date);

        let mut series = Self {
            name,
            kind,
            provenance,
            raw,
            fill: FillStrategy::default_for(kind),
            frequency: Frequency::Daily,
            grouping: GroupingMethod::Average,
            processed_range: None,
            selected_range: None,
            processed: DailyTable::new(),
        };
        series.selected_range = series.raw_span();
        if let Err(e) = series.reprocess(series.raw_span()) {
            warn!(series = %series.name, error = %e, "Initial processing failed");
        }
        series
    }

    /// Build a series from `(day, score)` rows as produced by source adapters
    pub fn from_rows(
        name: impl Into<String>,
        kind: VariableKind,
        provenance: Provenance,
        rows: impl IntoIterator<Item = (NaiveDate, Score)>,
    ) -> Self {
        let observations = rows
            .into_iter()
            .map(|(date, score)| Observation::new(date, score))
            .collect();
        Self::new(name, kind, provenance, observations)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn fill_strategy(&self) -> FillStrategy {
        self.fill
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn grouping(&self) -> GroupingMethod {
        self.grouping
    }

    // ===== Raw data =====

    pub fn raw_observations(&self) -> &[Observation] {
        &self.raw
    }

    pub fn raw_values(&self) -> Vec<Score> {
        self.raw.iter().map(|obs| obs.score).collect()
    }

    pub fn raw_dates(&self) -> Vec<NaiveDate> {
        self.raw.iter().map(|obs| obs.date).collect()
    }

    /// First to last raw date, None for an empty series
    pub fn raw_span(&self) -> Option<DateRange> {
        match (self.raw.first(), self.raw.last()) {
            (Some(first), Some(last)) => Some(DateRange::new(first.date, last.date)),
            _ => None,
        }
    }

    /// Days inside the raw span without any reading, ascending
    pub fn missing_dates(&self) -> Vec<NaiveDate> {
        fill::missing_dates(self.raw.iter().map(|obs| &obs.date))
    }

    /// Whether any day of `range` (default: the raw span) has no raw reading
    pub fn has_missing_dates(&self, range: Option<DateRange>) -> bool {
        match range {
            None => !self.missing_dates().is_empty(),
            Some(range) => {
                let recorded: BTreeSet<NaiveDate> = self.raw.iter().map(|obs| obs.date).collect();
                range.days().any(|day| !recorded.contains(&day))
            }
        }
    }

    /// Whether the raw spans of two series intersect
    pub fn overlaps(&self, other: &Series) -> bool {
        match (self.raw_span(), other.raw_span()) {
            (Some(a), Some(b)) => a.overlaps(&b),
            _ => false,
        }
    }

    // ===== Processed data =====

    pub fn processed(&self) -> &DailyTable {
        &self.processed
    }

    pub fn processed_values(&self) -> Vec<Score> {
        self.processed.values().copied().collect()
    }

    pub fn processed_dates(&self) -> Vec<NaiveDate> {
        self.processed.keys().copied().collect()
    }

    pub fn processed_range(&self) -> Option<DateRange> {
        self.processed_range
    }

    pub fn is_analyzable(&self) -> bool {
        self.processed.len() >= MIN_ANALYZABLE_POINTS
    }

    // ===== Selection =====

    pub fn selected_range(&self) -> Option<DateRange> {
        self.selected_range
    }

    /// Selected range moved back so the first bucket at the current
    /// frequency is not cut off
    pub fn selection_window(&self) -> Option<DateRange> {
        self.selected_range
            .map(|range| range.extend_back(self.frequency.selection_offset(range.start)))
    }

    pub fn selected_values(&self) -> Vec<Score> {
        self.selected_entries().map(|(_, score)| *score).collect()
    }

    pub fn selected_dates(&self) -> Vec<NaiveDate> {
        self.selected_entries().map(|(date, _)| *date).collect()
    }

    /// Whether the selected window contains a hole (only under `NoFill`)
    pub fn selected_range_has_missing(&self) -> bool {
        self.selected_entries().any(|(_, score)| score.is_missing())
    }

    fn selected_entries(&self) -> impl Iterator<Item = (&NaiveDate, &Score)> {
        let window = self.selection_window();
        self.processed
            .iter()
            .filter(move |(date, _)| window.is_some_and(|w| w.contains(**date)))
    }

    // ===== Statistics =====

    /// Mean of the selected window
    pub fn mean(&self) -> Score {
        self.kind.mean_of(&self.selected_values())
    }

    pub fn stdev(&self) -> Score {
        self.kind.stdev_of(&self.selected_values())
    }

    pub fn mean_string(&self) -> String {
        self.kind.mean_string_of(&self.selected_values())
    }

    pub fn stdev_string(&self) -> String {
        self.kind.stdev_string_of(&self.selected_values())
    }

    /// Mean of the processed values inside `range`
    pub fn mean_over(&self, range: DateRange) -> Score {
        self.kind.mean_of(&self.values_over(range))
    }

    pub fn stdev_over(&self, range: DateRange) -> Score {
        self.kind.stdev_of(&self.values_over(range))
    }

    fn values_over(&self, range: DateRange) -> Vec<Score> {
        self.processed
            .range(range.start..=range.end)
            .map(|(_, score)| *score)
            .collect()
    }

    // ===== Mutators =====

    /// Change the fill strategy and rebuild over the current range
    pub fn set_fill_strategy(&mut self, strategy: FillStrategy) -> SeriesResult<()> {
        self.check_fill(strategy)?;
        self.fill = strategy;
        self.reprocess(self.processed_range)
    }

    /// Change the resampling frequency and rebuild over the current range
    pub fn set_frequency(&mut self, frequency: Frequency, grouping: GroupingMethod) -> SeriesResult<()> {
        self.check_grouping(grouping)?;
        self.frequency = frequency;
        self.grouping = grouping;
        self.reprocess(self.processed_range)
    }

    /// Select the window used for display and analysis
    pub fn set_date_range(&mut self, start: NaiveDate, end: NaiveDate) -> SeriesResult<()> {
        let range = DateRange::try_new(start, end).ok_or(SeriesError::InvalidRange { start, end })?;
        self.selected_range = Some(range);
        Ok(())
    }

    /// Append one reading and rebuild over the new raw span
    pub fn add_entry(&mut self, score: Score, date: NaiveDate, time: Option<NaiveTime>) -> SeriesResult<()> {
        if score.is_missing() || !score.fits(self.kind) {
            return Err(SeriesError::KindMismatch {
                series: self.name.clone(),
                kind: self.kind,
                score: score.to_string(),
            });
        }

        let observation = Observation { date, time, score };
        // Insert after any readings already on the same day
        let at = self.raw.partition_point(|obs| obs.date <= date);
        self.raw.insert(at, observation);

        if self.selected_range.is_none() {
            self.selected_range = self.raw_span();
        }
        self.reprocess(self.raw_span())
    }

    /// Set every processing policy at once and rebuild over `range`
    /// (default: the raw span)
    pub fn update_calculation(
        &mut self,
        frequency: Frequency,
        grouping: GroupingMethod,
        fill: FillStrategy,
        range: Option<DateRange>,
    ) -> SeriesResult<()> {
        self.check_fill(fill)?;
        self.check_grouping(grouping)?;
        self.fill = fill;
        self.frequency = frequency;
        self.grouping = grouping;

        let range = range.or_else(|| self.raw_span());
        if range.is_some() {
            self.selected_range = range;
        }
        self.reprocess(range)
    }

    /// Rebuild the processed table over `range` with the current policies
    pub fn shift_processed_dates(&mut self, range: DateRange) -> SeriesResult<()> {
        self.reprocess(Some(range))
    }

    /// Drop all processed data, e.g. when aligned members share no days
    pub(crate) fn clear_processed(&mut self) {
        self.processed = DailyTable::new();
        self.processed_range = None;
    }

    fn check_fill(&self, strategy: FillStrategy) -> SeriesResult<()> {
        if FillStrategy::supported_for(self.kind).contains(&strategy) {
            Ok(())
        } else {
            Err(SeriesError::UnsupportedFill {
                strategy,
                kind: self.kind,
            })
        }
    }

    fn check_grouping(&self, grouping: GroupingMethod) -> SeriesResult<()> {
        if GroupingMethod::supported_for(self.kind).contains(&grouping) {
            Ok(())
        } else {
            Err(SeriesError::UnsupportedGrouping {
                grouping,
                kind: self.kind,
            })
        }
    }

    fn reprocess(&mut self, range: Option<DateRange>) -> SeriesResult<()> {
        let Some(range) = range else {
            self.clear_processed();
            return Ok(());
        };

        let merged = fill::combine_duplicate_dates(&self.raw, self.kind);
        let daily = fill::reindex_and_fill(&merged, range, self.fill, self.kind)?;
        self.processed = resample::resample(&daily, self.frequency, self.grouping, self.kind)?;
        self.processed_range = Some(range);

        debug!(
            series = %self.name,
            frequency = %self.frequency,
            fill = %self.fill,
            range = %range,
            points = self.processed.len(),
            "Recomputed series"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::types::RingCategory;
    use chrono::Duration;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn continuous(rows: &[(u32, u32, f64)]) -> Series {
        Series::from_rows(
            "mood",
            VariableKind::Continuous,
            Provenance::Manual {
                panel: "Mood".to_string(),
            },
            rows.iter().map(|(m, d, v)| (date(*m, *d), Score::Value(*v))),
        )
    }

    fn values(scores: &[Score]) -> Vec<f64> {
        scores.iter().map(Score::as_f64).collect()
    }

    #[test]
    fn test_duplicates_summed_and_zero_filled() {
        let s = continuous(&[(1, 1, 2.0), (1, 1, 3.0), (1, 3, 5.0)]);

        assert_eq!(s.processed_dates(), vec![date(1, 1), date(1, 2), date(1, 3)]);
        assert_eq!(values(&s.processed_values()), vec![5.0, 0.0, 5.0]);
        // Raw rows are kept as logged
        assert_eq!(s.raw_values().len(), 3);
    }

    #[test]
    fn test_mean_excluding_fill() {
        let mut s = continuous(&[(1, 1, 2.0), (1, 1, 3.0), (1, 3, 5.0)]);
        s.set_fill_strategy(FillStrategy::MeanExcludingMissing).unwrap();

        assert_eq!(values(&s.processed_values()), vec![5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_missing_rows_dropped() {
        let s = Series::from_rows(
            "steps",
            VariableKind::Continuous,
            Provenance::Habit,
            vec![
                (date(1, 1), Score::Value(1.0)),
                (date(1, 2), Score::Missing),
                (date(1, 3), Score::Value(f64::NAN)),
            ],
        );
        assert_eq!(s.raw_values().len(), 1);
        assert_eq!(s.processed_values().len(), 1);
    }

    #[test]
    fn test_empty_series() {
        let s = continuous(&[]);

        assert!(s.processed().is_empty());
        assert!(s.raw_span().is_none());
        assert!(s.selected_values().is_empty());
        assert!(!s.is_analyzable());
        assert!(s.missing_dates().is_empty());
        assert_eq!(s.mean(), Score::Missing);
    }

    #[test]
    fn test_missing_dates_and_has_missing() {
        let s = continuous(&[(1, 1, 1.0), (1, 4, 1.0), (1, 5, 1.0)]);

        assert_eq!(s.missing_dates(), vec![date(1, 2), date(1, 3)]);
        assert!(s.has_missing_dates(None));
        assert!(!s.has_missing_dates(Some(DateRange::new(date(1, 4), date(1, 5)))));
        assert!(s.has_missing_dates(Some(DateRange::new(date(1, 4), date(1, 6)))));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut s = continuous(&[(1, 1, 1.0), (1, 5, 3.0), (1, 9, 2.0), (1, 20, 4.0)]);
        s.update_calculation(Frequency::Weekly, GroupingMethod::Sum, FillStrategy::ForwardFill, None)
            .unwrap();
        let first = s.processed().clone();

        s.update_calculation(Frequency::Weekly, GroupingMethod::Sum, FillStrategy::ForwardFill, None)
            .unwrap();
        assert_eq!(s.processed(), &first);
    }

    #[test]
    fn test_no_fill_marks_selection() {
        let mut s = continuous(&[(1, 1, 1.0), (1, 3, 1.0)]);
        assert!(!s.selected_range_has_missing());

        s.set_fill_strategy(FillStrategy::NoFill).unwrap();
        assert!(s.selected_range_has_missing());
        assert_eq!(s.processed()[&date(1, 2)], Score::Missing);
    }

    #[test]
    fn test_add_entry_rebuilds() {
        let mut s = continuous(&[(1, 1, 1.0), (1, 2, 1.0)]);
        s.add_entry(Score::Value(4.0), date(1, 4), None).unwrap();
        s.add_entry(Score::Value(2.0), date(1, 1), None).unwrap();

        assert_eq!(s.raw_span(), Some(DateRange::new(date(1, 1), date(1, 4))));
        assert_eq!(values(&s.processed_values()), vec![3.0, 1.0, 0.0, 4.0]);
        assert!(s.is_analyzable());
    }

    #[test]
    fn test_add_entry_rejects_wrong_kind() {
        let mut s = continuous(&[(1, 1, 1.0)]);
        let t = NaiveTime::from_hms_opt(23, 0, 0).unwrap();

        let err = s.add_entry(Score::TimeOfDay(t), date(1, 2), None).unwrap_err();
        assert!(matches!(err, SeriesError::KindMismatch { .. }));
        assert_eq!(s.raw_values().len(), 1);
    }

    #[test]
    fn test_time_series_policies() {
        let t = |h| Score::TimeOfDay(NaiveTime::from_hms_opt(h, 0, 0).unwrap());
        let mut s = Series::from_rows(
            "Bedtime",
            VariableKind::Time,
            Provenance::Ring {
                category: RingCategory::Sleep,
            },
            vec![(date(1, 1), t(22)), (date(1, 3), t(23))],
        );

        // Default fill for time plugs the gap with the mean time
        assert_eq!(
            s.processed()[&date(1, 2)],
            Score::TimeOfDay(NaiveTime::from_hms_opt(22, 30, 0).unwrap())
        );
        assert!(s.set_fill_strategy(FillStrategy::ZerosFill).is_err());
        assert!(s.set_frequency(Frequency::Weekly, GroupingMethod::Sum).is_err());
        assert_eq!(s.fill_strategy(), FillStrategy::MeanExcludingMissing);
    }

    #[test]
    fn test_selection_window_weekly() {
        // Two full weeks starting Monday 2024-01-01
        let rows: Vec<(u32, u32, f64)> = (1..=14).map(|d| (1, d, 1.0)).collect();
        let mut s = continuous(&rows);
        s.set_frequency(Frequency::Weekly, GroupingMethod::Sum).unwrap();
        s.set_date_range(date(1, 10), date(1, 14)).unwrap();

        // Window reaches back to Thursday 2024-01-04, taking in no earlier Monday,
        // so only the second week is selected
        assert_eq!(s.selected_dates(), vec![date(1, 8)]);

        s.set_date_range(date(1, 7), date(1, 14)).unwrap();
        assert_eq!(s.selected_dates(), vec![date(1, 1), date(1, 8)]);
        assert_eq!(values(&s.selected_values()), vec![7.0, 7.0]);
    }

    #[test]
    fn test_invalid_date_range() {
        let mut s = continuous(&[(1, 1, 1.0)]);
        let err = s.set_date_range(date(1, 5), date(1, 1)).unwrap_err();
        assert!(matches!(err, SeriesError::InvalidRange { .. }));
    }

    #[test]
    fn test_statistics_over_selection() {
        let mut s = continuous(&[(1, 1, 2.0), (1, 2, 4.0), (1, 3, 6.0), (1, 4, 8.0)]);
        assert_eq!(s.mean(), Score::Value(5.0));

        s.set_date_range(date(1, 3), date(1, 4)).unwrap();
        assert_eq!(s.mean_string(), "7.00");
        assert_eq!(s.stdev_string(), "1.00");
        assert_eq!(s.mean_over(DateRange::new(date(1, 1), date(1, 2))), Score::Value(3.0));
    }

    #[test]
    fn test_overlaps() {
        let a = continuous(&[(1, 1, 1.0), (1, 10, 1.0)]);
        let b = continuous(&[(1, 5, 1.0), (1, 20, 1.0)]);
        let c = continuous(&[(2, 1, 1.0), (2, 2, 1.0)]);

        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_shift_processed_dates() {
        let mut s = continuous(&[(1, 1, 1.0), (1, 10, 2.0)]);
        s.shift_processed_dates(DateRange::new(date(1, 5), date(1, 12))).unwrap();

        assert_eq!(s.processed().len(), 8);
        assert_eq!(s.processed_dates().first(), Some(&date(1, 5)));
        assert_eq!(s.processed_range(), Some(DateRange::new(date(1, 5), date(1, 12))));
        assert_eq!(s.processed()[&(date(1, 5) + Duration::days(5))], Score::Value(2.0));
    }
}
