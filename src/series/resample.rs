//! Weekly and monthly resampling
//!
//! Weeks run Monday to Sunday and are keyed by their Monday; months are keyed
//! by their first day. A leading partial period is padded back to the period
//! start so its aggregate is comparable with a complete one: with the mean of
//! the partial period when averaging, with zeros when summing.

use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

use super::error::{SeriesError, SeriesResult};
use super::fill::DailyTable;
use super::kind::VariableKind;
use super::types::{Frequency, GroupingMethod, Score};

/// Resample a contiguous daily table to the given frequency
pub fn resample(
    daily: &DailyTable,
    frequency: Frequency,
    grouping: GroupingMethod,
    kind: VariableKind,
) -> SeriesResult<DailyTable> {
    if !GroupingMethod::supported_for(kind).contains(&grouping) {
        return Err(SeriesError::UnsupportedGrouping { grouping, kind });
    }

    Ok(match frequency {
        Frequency::Daily | Frequency::Yearly => daily.clone(),
        Frequency::Weekly => weekly(daily, grouping, kind),
        Frequency::Monthly => monthly(daily, grouping, kind),
    })
}

/// Monday on or before `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.day0() as i64)
}

fn weekly(daily: &DailyTable, grouping: GroupingMethod, kind: VariableKind) -> DailyTable {
    let Some(&first) = daily.keys().next() else {
        return DailyTable::new();
    };

    let days_past_monday = first.weekday().num_days_from_monday() as i64;
    let first_sunday = first + Duration::days(6 - days_past_monday);
    let padded = pad_leading(daily, week_start(first), first..=first_sunday, grouping, kind);

    let buckets = group_by(&padded, week_start);
    let short_tail = buckets.len() > 1 && buckets.last_key_value().is_some_and(|(_, days)| days.len() < 7);
    let mut weeks = aggregate_buckets(buckets, grouping, kind);

    // A trailing week shorter than 7 days is added onto the week before it
    if short_tail {
        if let Some((_, tail)) = weeks.pop_last() {
            if let Some(mut prior) = weeks.last_entry() {
                let merged = merge_tail(*prior.get(), tail, kind);
                prior.insert(merged);
            }
        }
    }
    weeks
}

/// Combine a short trailing bucket's aggregate with the previous one.
///
/// Numbers add. Times of day cannot be summed, so they take the mean of
/// the two. A hole on either side stays a hole.
fn merge_tail(prior: Score, tail: Score, kind: VariableKind) -> Score {
    if prior.is_missing() || tail.is_missing() {
        return Score::Missing;
    }
    match kind {
        VariableKind::Time => kind.mean_of(&[prior, tail]),
        _ => Score::Value(prior.as_f64() + tail.as_f64()),
    }
}

fn monthly(daily: &DailyTable, grouping: GroupingMethod, kind: VariableKind) -> DailyTable {
    let Some(&first) = daily.keys().next() else {
        return DailyTable::new();
    };

    let start = month_start(first);
    let month_end = daily
        .keys()
        .take_while(|d| month_start(**d) == start)
        .last()
        .copied()
        .unwrap_or(first);
    let padded = pad_leading(daily, start, first..=month_end, grouping, kind);

    aggregate_buckets(group_by(&padded, month_start), grouping, kind)
}

/// Prepend days from `period_start` up to the first recorded day
fn pad_leading(
    daily: &DailyTable,
    period_start: NaiveDate,
    partial: std::ops::RangeInclusive<NaiveDate>,
    grouping: GroupingMethod,
    kind: VariableKind,
) -> DailyTable {
    let mut padded = daily.clone();
    let Some(&first) = daily.keys().next() else {
        return padded;
    };
    if first == period_start {
        return padded;
    }

    let pad = match grouping {
        GroupingMethod::Sum => Score::Value(0.0),
        GroupingMethod::Average => {
            let partial_scores: Vec<Score> = daily.range(partial).map(|(_, s)| *s).collect();
            kind.mean_of(&partial_scores)
        }
    };

    let mut day = period_start;
    while day < first {
        padded.insert(day, pad);
        day += Duration::days(1);
    }
    padded
}

fn group_by(
    table: &DailyTable,
    key: impl Fn(NaiveDate) -> NaiveDate,
) -> BTreeMap<NaiveDate, Vec<Score>> {
    let mut buckets: BTreeMap<NaiveDate, Vec<Score>> = BTreeMap::new();
    for (date, score) in table {
        buckets.entry(key(*date)).or_default().push(*score);
    }
    buckets
}

fn aggregate_buckets(
    buckets: BTreeMap<NaiveDate, Vec<Score>>,
    grouping: GroupingMethod,
    kind: VariableKind,
) -> DailyTable {
    buckets
        .into_iter()
        .map(|(key, days)| (key, aggregate(&days, grouping, kind)))
        .collect()
}

/// One bucket's value; any hole in the bucket makes the whole bucket a hole
fn aggregate(days: &[Score], grouping: GroupingMethod, kind: VariableKind) -> Score {
    if days.iter().any(Score::is_missing) {
        return Score::Missing;
    }
    match grouping {
        GroupingMethod::Sum => Score::Value(days.iter().map(Score::as_f64).sum()),
        GroupingMethod::Average => kind.mean_of(days),
    }
}
