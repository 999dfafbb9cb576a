//! Deduplication, gap detection and gap filling
//!
//! Raw observations can repeat a day (two meals, two log entries) and skip
//! days entirely. The helpers here turn them into a table keyed by unique
//! calendar day and reindex that table onto a contiguous range, filling the
//! holes according to a `FillStrategy`.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use super::error::{SeriesError, SeriesResult};
use super::kind::VariableKind;
use super::types::{DateRange, FillStrategy, Observation, Score};

/// One score per calendar day, ordered by date
pub type DailyTable = BTreeMap<NaiveDate, Score>;

/// Merge observations sharing a calendar day.
///
/// Numeric kinds sum same-day readings (two meals make one day's intake).
/// Time-of-day readings are never merged; the first reading of the day is
/// kept.
pub fn combine_duplicate_dates(observations: &[Observation], kind: VariableKind) -> DailyTable {
    let mut table = DailyTable::new();

    for obs in observations {
        if obs.score.is_missing() {
            continue;
        }
        match (kind, table.get_mut(&obs.date)) {
            (VariableKind::Time, Some(_)) => {}
            (_, Some(Score::Value(total))) => *total += obs.score.as_f64(),
            (_, Some(_)) => {}
            (_, None) => {
                table.insert(obs.date, obs.score);
            }
        }
    }

    table
}

/// Days between the first and last date that have no entry, ascending
pub fn missing_dates<'a>(dates: impl IntoIterator<Item = &'a NaiveDate>) -> Vec<NaiveDate> {
    let present: BTreeSet<NaiveDate> = dates.into_iter().copied().collect();
    let (Some(first), Some(last)) = (present.first(), present.last()) else {
        return Vec::new();
    };

    DateRange::new(*first, *last)
        .days()
        .filter(|day| !present.contains(day))
        .collect()
}

/// Reindex a daily table onto `range`, filling days without a value.
///
/// Values outside `range` are dropped, except that forward and backward fill
/// may pull the nearest known value from just outside it. Every strategy but
/// `NoFill` leaves a concrete value on every day of the range.
pub fn reindex_and_fill(
    table: &DailyTable,
    range: DateRange,
    strategy: FillStrategy,
    kind: VariableKind,
) -> SeriesResult<DailyTable> {
    if !FillStrategy::supported_for(kind).contains(&strategy) {
        return Err(SeriesError::UnsupportedFill { strategy, kind });
    }
    if table.is_empty() {
        return Ok(DailyTable::new());
    }

    let present = |date: &NaiveDate| table.get(date).filter(|s| !s.is_missing()).copied();

    let filled = match strategy {
        FillStrategy::NoFill => range
            .days()
            .map(|day| (day, present(&day).unwrap_or(Score::Missing)))
            .collect(),

        FillStrategy::ZerosFill => range
            .days()
            .map(|day| (day, present(&day).unwrap_or(Score::Value(0.0))))
            .collect(),

        FillStrategy::ForwardFill => range
            .days()
            .map(|day| {
                let score = present(&day)
                    .or_else(|| nearest_before(table, day))
                    .or_else(|| nearest_after(table, day))
                    .unwrap_or(Score::Missing);
                (day, score)
            })
            .collect(),

        FillStrategy::BackwardFill => range
            .days()
            .map(|day| {
                let score = present(&day)
                    .or_else(|| nearest_after(table, day))
                    .or_else(|| nearest_before(table, day))
                    .unwrap_or(Score::Missing);
                (day, score)
            })
            .collect(),

        FillStrategy::MeanIncludingMissing | FillStrategy::MeanExcludingMissing => {
            let fill = mean_fill_value(table, range, strategy, kind);
            range
                .days()
                .map(|day| (day, present(&day).unwrap_or(fill)))
                .collect()
        }
    };

    Ok(filled)
}

/// Value used to plug gaps under the two mean strategies.
///
/// Including missing days: the sum of present values divided by every day in
/// the range. Excluding: the mean of only the present values. Time-of-day
/// series use their wrapped mean for both.
fn mean_fill_value(
    table: &DailyTable,
    range: DateRange,
    strategy: FillStrategy,
    kind: VariableKind,
) -> Score {
    let in_range: Vec<Score> = table
        .range(range.start..=range.end)
        .map(|(_, s)| *s)
        .filter(|s| !s.is_missing())
        .collect();

    if kind != VariableKind::Time && strategy == FillStrategy::MeanIncludingMissing {
        let total: f64 = in_range.iter().map(Score::as_f64).sum();
        return Score::Value(total / range.num_days() as f64);
    }

    match kind.mean_of(&in_range) {
        Score::Missing => {
            // Nothing recorded inside the range; fall back to everything known
            let all: Vec<Score> = table.values().copied().collect();
            kind.mean_of(&all)
        }
        score => score,
    }
}

fn nearest_before(table: &DailyTable, day: NaiveDate) -> Option<Score> {
    table
        .range(..day)
        .rev()
        .map(|(_, s)| *s)
        .find(|s| !s.is_missing())
}

fn nearest_after(table: &DailyTable, day: NaiveDate) -> Option<Score> {
    table
        .range(day..)
        .map(|(_, s)| *s)
        .find(|s| !s.is_missing())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn obs(m: u32, d: u32, v: f64) -> Observation {
        Observation::new(date(m, d), Score::Value(v))
    }

    fn table(entries: &[(u32, f64)]) -> DailyTable {
        entries
            .iter()
            .map(|(d, v)| (date(1, *d), Score::Value(*v)))
            .collect()
    }

    fn values(t: &DailyTable) -> Vec<f64> {
        t.values().map(Score::as_f64).collect()
    }

    #[test]
    fn test_combine_duplicates_sums() {
        let raw = vec![obs(1, 1, 2.0), obs(1, 1, 3.0), obs(1, 1, 4.0), obs(1, 3, 5.0)];
        let t = combine_duplicate_dates(&raw, VariableKind::Continuous);

        assert_eq!(t.len(), 2);
        assert_eq!(t[&date(1, 1)], Score::Value(9.0));
        assert_eq!(t[&date(1, 3)], Score::Value(5.0));
    }

    #[test]
    fn test_combine_duplicates_keeps_first_time() {
        let first = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        let second = NaiveTime::from_hms_opt(1, 0, 0).unwrap();
        let raw = vec![
            Observation::new(date(1, 1), Score::TimeOfDay(first)),
            Observation::new(date(1, 1), Score::TimeOfDay(second)),
        ];
        let t = combine_duplicate_dates(&raw, VariableKind::Time);

        assert_eq!(t.len(), 1);
        assert_eq!(t[&date(1, 1)], Score::TimeOfDay(first));
    }

    #[test]
    fn test_missing_dates() {
        let dates = vec![date(1, 1), date(1, 4), date(1, 6)];
        assert_eq!(
            missing_dates(&dates),
            vec![date(1, 2), date(1, 3), date(1, 5)]
        );
        assert!(missing_dates(&Vec::new()).is_empty());
    }

    #[test]
    fn test_zeros_and_no_fill() {
        let t = table(&[(1, 5.0), (3, 5.0)]);
        let range = DateRange::new(date(1, 1), date(1, 3));

        let zeros = reindex_and_fill(&t, range, FillStrategy::ZerosFill, VariableKind::Continuous).unwrap();
        assert_eq!(values(&zeros), vec![5.0, 0.0, 5.0]);

        let none = reindex_and_fill(&t, range, FillStrategy::NoFill, VariableKind::Continuous).unwrap();
        assert_eq!(none[&date(1, 2)], Score::Missing);
    }

    #[test]
    fn test_mean_including_and_excluding() {
        // k = 2 present values, S = 6, D = 4 days
        let t = table(&[(1, 2.0), (4, 4.0)]);
        let range = DateRange::new(date(1, 1), date(1, 4));

        let incl = reindex_and_fill(&t, range, FillStrategy::MeanIncludingMissing, VariableKind::Continuous).unwrap();
        assert_eq!(values(&incl), vec![2.0, 1.5, 1.5, 4.0]);

        let excl = reindex_and_fill(&t, range, FillStrategy::MeanExcludingMissing, VariableKind::Continuous).unwrap();
        assert_eq!(values(&excl), vec![2.0, 3.0, 3.0, 4.0]);
    }

    #[test]
    fn test_forward_and_backward_fill() {
        let t = table(&[(2, 1.0), (5, 2.0)]);
        let range = DateRange::new(date(1, 1), date(1, 6));

        let fwd = reindex_and_fill(&t, range, FillStrategy::ForwardFill, VariableKind::Continuous).unwrap();
        assert_eq!(values(&fwd), vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0]);

        let back = reindex_and_fill(&t, range, FillStrategy::BackwardFill, VariableKind::Continuous).unwrap();
        assert_eq!(values(&back), vec![1.0, 1.0, 2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_forward_fill_pulls_value_from_before_range() {
        let t = table(&[(1, 7.0), (5, 2.0)]);
        let range = DateRange::new(date(1, 3), date(1, 5));

        let fwd = reindex_and_fill(&t, range, FillStrategy::ForwardFill, VariableKind::Continuous).unwrap();
        assert_eq!(values(&fwd), vec![7.0, 7.0, 2.0]);
    }

    #[test]
    fn test_every_fill_covers_range() {
        let t = table(&[(2, 1.0), (9, 3.0)]);
        let range = DateRange::new(date(1, 1), date(1, 10));

        for strategy in FillStrategy::all() {
            let filled = reindex_and_fill(&t, range, *strategy, VariableKind::Continuous).unwrap();
            assert_eq!(filled.len(), 10);
            if *strategy != FillStrategy::NoFill {
                assert!(filled.values().all(|s| !s.is_missing()), "{strategy} left a gap");
            }
        }
    }

    #[test]
    fn test_zero_fill_rejected_for_time() {
        let t = DailyTable::new();
        let range = DateRange::new(date(1, 1), date(1, 2));
        let err = reindex_and_fill(&t, range, FillStrategy::ZerosFill, VariableKind::Time).unwrap_err();
        assert!(matches!(err, SeriesError::UnsupportedFill { .. }));
    }

    #[test]
    fn test_time_mean_fill() {
        let t: DailyTable = [
            (date(1, 1), Score::TimeOfDay(NaiveTime::from_hms_opt(22, 0, 0).unwrap())),
            (date(1, 3), Score::TimeOfDay(NaiveTime::from_hms_opt(23, 0, 0).unwrap())),
        ]
        .into_iter()
        .collect();
        let range = DateRange::new(date(1, 1), date(1, 3));

        let filled = reindex_and_fill(&t, range, FillStrategy::MeanIncludingMissing, VariableKind::Time).unwrap();
        assert_eq!(
            filled[&date(1, 2)],
            Score::TimeOfDay(NaiveTime::from_hms_opt(22, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_empty_table_stays_empty() {
        let range = DateRange::new(date(1, 1), date(1, 5));
        let filled = reindex_and_fill(&DailyTable::new(), range, FillStrategy::ZerosFill, VariableKind::Continuous).unwrap();
        assert!(filled.is_empty());
    }
}
