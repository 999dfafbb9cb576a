//! Pairs of series analysed together
//!
//! A `SeriesPair` holds shared handles to one dependent series and an
//! optional independent one. Members are owned elsewhere (usually by the
//! registry) and may sit in several pairs at once.

use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

use super::error::{SeriesError, SeriesResult};
use super::series::Series;
use super::types::{DateRange, FillStrategy, Frequency, GroupingMethod};

/// Single-threaded shared handle to a series
pub type SharedSeries = Rc<RefCell<Series>>;

/// Wrap a series in a shared handle
pub fn shared(series: Series) -> SharedSeries {
    Rc::new(RefCell::new(series))
}

/// Role of a series inside a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The only member of a one-series pair
    Single,
    /// X, the candidate cause
    Independent,
    /// Y, the candidate effect
    Dependent,
}

/// One setting per role, in the order single, independent, dependent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSettings<T> {
    pub single: T,
    pub independent: T,
    pub dependent: T,
}

impl<T: Copy> RoleSettings<T> {
    /// Same setting for every role
    pub fn uniform(value: T) -> Self {
        Self {
            single: value,
            independent: value,
            dependent: value,
        }
    }

    pub fn for_role(&self, role: Role) -> T {
        match role {
            Role::Single => self.single,
            Role::Independent => self.independent,
            Role::Dependent => self.dependent,
        }
    }
}

impl<T> From<[T; 3]> for RoleSettings<T> {
    fn from([single, independent, dependent]: [T; 3]) -> Self {
        Self {
            single,
            independent,
            dependent,
        }
    }
}

impl<T: Copy> TryFrom<&[T]> for RoleSettings<T> {
    type Error = SeriesError;

    fn try_from(values: &[T]) -> Result<Self, Self::Error> {
        let get = |i: usize, role: &'static str| values.get(i).copied().ok_or(SeriesError::MissingRoleSetting(role));
        Ok(Self {
            single: get(0, "single")?,
            independent: get(1, "independent")?,
            dependent: get(2, "dependent")?,
        })
    }
}

/// Inputs of the last recomputation, compared when the cache is requested
#[derive(Debug, Clone, PartialEq)]
struct CalculationKey {
    range: Option<DateRange>,
    frequency: Frequency,
    grouping: RoleSettings<GroupingMethod>,
    fill: RoleSettings<FillStrategy>,
}

/// A dependent series and an optional independent one
#[derive(Debug, Clone)]
pub struct SeriesPair {
    dependent: SharedSeries,
    independent: Option<SharedSeries>,
    last: Option<CalculationKey>,
}

impl SeriesPair {
    /// Pair of an effect (`dependent`) and a candidate cause (`independent`)
    pub fn new(dependent: SharedSeries, independent: SharedSeries) -> Self {
        Self {
            dependent,
            independent: Some(independent),
            last: None,
        }
    }

    /// Pair holding a single series
    pub fn single(series: SharedSeries) -> Self {
        Self {
            dependent: series,
            independent: None,
            last: None,
        }
    }

    pub fn dependent(&self) -> &SharedSeries {
        &self.dependent
    }

    pub fn independent(&self) -> Option<&SharedSeries> {
        self.independent.as_ref()
    }

    /// Members without preference for order: dependent first
    pub fn members(&self) -> Vec<SharedSeries> {
        let mut members = vec![Rc::clone(&self.dependent)];
        if let Some(independent) = &self.independent {
            members.push(Rc::clone(independent));
        }
        members
    }

    fn role_of(&self, member: &SharedSeries) -> Role {
        match &self.independent {
            None => Role::Single,
            Some(independent) if Rc::ptr_eq(member, independent) => Role::Independent,
            Some(_) => Role::Dependent,
        }
    }

    /// True when every member has processed data
    pub fn is_valid(&self) -> bool {
        self.members()
            .iter()
            .all(|member| !member.borrow().processed().is_empty())
    }

    /// Overlap of the members' raw spans, the range a caller may select from
    pub fn bounds_for_date_range(&self) -> Option<DateRange> {
        raw_overlap(&self.members())
    }

    /// Rebuild every member over the overlap of their raw spans.
    ///
    /// No data is invented outside the overlap. Returns the overlap, or
    /// None (leaving every member without processed data) when the members
    /// share no days.
    pub fn align_dates_trimming(members: &[SharedSeries]) -> SeriesResult<Option<DateRange>> {
        let overlap = raw_overlap(members);
        for member in members {
            let mut series = member.borrow_mut();
            match overlap {
                Some(range) => series.shift_processed_dates(range)?,
                None => series.clear_processed(),
            }
        }
        Ok(overlap)
    }

    /// Recompute every member with the settings for its role.
    ///
    /// With `use_cache`, a call repeating the previous inputs does nothing.
    /// For two members the requested range is trimmed to their overlap (the
    /// overlap itself when no range is given). Returns whether anything was
    /// recomputed.
    pub fn update_calculation(
        &mut self,
        frequency: Frequency,
        grouping: &RoleSettings<GroupingMethod>,
        fill: &RoleSettings<FillStrategy>,
        range: Option<DateRange>,
        use_cache: bool,
    ) -> SeriesResult<bool> {
        let key = CalculationKey {
            range,
            frequency,
            grouping: *grouping,
            fill: *fill,
        };
        if use_cache && self.last.as_ref() == Some(&key) {
            return Ok(false);
        }

        let members = self.members();
        let effective = if self.independent.is_some() {
            let overlap = Self::align_dates_trimming(&members)?;
            match (range, overlap) {
                (_, None) => None,
                (None, Some(overlap)) => Some(overlap),
                (Some(requested), Some(overlap)) => requested.intersection(&overlap),
            }
        } else {
            range
        };

        for member in &members {
            let role = self.role_of(member);
            let mut series = member.borrow_mut();
            match effective {
                None if self.independent.is_some() => series.clear_processed(),
                _ => series.update_calculation(
                    frequency,
                    grouping.for_role(role),
                    fill.for_role(role),
                    effective,
                )?,
            }
        }

        debug!(
            dependent = %self.dependent.borrow().name(),
            independent = self.independent.as_ref().map(|s| s.borrow().name().to_string()).unwrap_or_default(),
            frequency = %frequency,
            valid = self.is_valid(),
            "Recomputed pair"
        );
        self.last = Some(key);
        Ok(true)
    }
}

/// `[max(starts), min(ends)]` over the members' raw spans
fn raw_overlap(members: &[SharedSeries]) -> Option<DateRange> {
    let mut overlap: Option<DateRange> = None;
    for (i, member) in members.iter().enumerate() {
        let span = member.borrow().raw_span()?;
        overlap = if i == 0 {
            Some(span)
        } else {
            Some(overlap?.intersection(&span)?)
        };
    }
    overlap
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::kind::VariableKind;
    use crate::series::types::{Provenance, Score};
    use chrono::NaiveDate;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn series(name: &str, from: u32, to: u32) -> SharedSeries {
        shared(Series::from_rows(
            name,
            VariableKind::Continuous,
            Provenance::Habit,
            (from..=to).map(|d| (date(1, d), Score::Value(d as f64))),
        ))
    }

    #[test]
    fn test_role_settings() {
        let fills = RoleSettings::from([
            FillStrategy::ZerosFill,
            FillStrategy::ForwardFill,
            FillStrategy::NoFill,
        ]);
        assert_eq!(fills.for_role(Role::Independent), FillStrategy::ForwardFill);
        assert_eq!(fills.for_role(Role::Dependent), FillStrategy::NoFill);

        let short: &[GroupingMethod] = &[GroupingMethod::Sum];
        assert_eq!(
            RoleSettings::try_from(short).unwrap_err(),
            SeriesError::MissingRoleSetting("independent")
        );
    }

    #[test]
    fn test_bounds_use_raw_overlap() {
        let pair = SeriesPair::new(series("mood", 1, 10), series("sleep", 5, 20));
        assert_eq!(
            pair.bounds_for_date_range(),
            Some(DateRange::new(date(1, 5), date(1, 10)))
        );
    }

    #[test]
    fn test_align_trims_to_overlap() {
        let a = series("a", 1, 10);
        let b = series("b", 5, 20);
        let overlap = SeriesPair::align_dates_trimming(&[a.clone(), b.clone()]).unwrap();

        assert_eq!(overlap, Some(DateRange::new(date(1, 5), date(1, 10))));
        assert_eq!(a.borrow().processed().len(), 6);
        assert_eq!(b.borrow().processed().len(), 6);
        // Raw data is untouched
        assert_eq!(b.borrow().raw_values().len(), 16);
    }

    #[test]
    fn test_update_calculation_uses_role_settings() {
        let dependent = series("mood", 1, 14);
        let independent = series("sleep", 1, 14);
        let mut pair = SeriesPair::new(dependent.clone(), independent.clone());

        let grouping = RoleSettings::from([
            GroupingMethod::Average,
            GroupingMethod::Sum,
            GroupingMethod::Average,
        ]);
        let fill = RoleSettings::uniform(FillStrategy::ZerosFill);
        assert!(pair
            .update_calculation(Frequency::Weekly, &grouping, &fill, None, false)
            .unwrap());

        assert_eq!(independent.borrow().grouping(), GroupingMethod::Sum);
        assert_eq!(dependent.borrow().grouping(), GroupingMethod::Average);
        assert_eq!(independent.borrow().processed_values(), vec![Score::Value(28.0), Score::Value(77.0)]);
        assert_eq!(dependent.borrow().processed_values(), vec![Score::Value(4.0), Score::Value(11.0)]);
        assert!(pair.is_valid());
    }

    #[test]
    fn test_cache_skips_identical_call() {
        let mut pair = SeriesPair::new(series("mood", 1, 10), series("sleep", 1, 10));
        let grouping = RoleSettings::uniform(GroupingMethod::Average);
        let fill = RoleSettings::uniform(FillStrategy::ZerosFill);

        assert!(pair.update_calculation(Frequency::Daily, &grouping, &fill, None, true).unwrap());
        assert!(!pair.update_calculation(Frequency::Daily, &grouping, &fill, None, true).unwrap());
        assert!(pair.update_calculation(Frequency::Daily, &grouping, &fill, None, false).unwrap());
        assert!(pair.update_calculation(Frequency::Weekly, &grouping, &fill, None, true).unwrap());
    }

    #[test]
    fn test_requested_range_trimmed_to_overlap() {
        let dependent = series("mood", 1, 10);
        let mut pair = SeriesPair::new(dependent.clone(), series("sleep", 5, 20));
        let requested = DateRange::new(date(1, 3), date(1, 8));

        pair.update_calculation(
            Frequency::Daily,
            &RoleSettings::uniform(GroupingMethod::Average),
            &RoleSettings::uniform(FillStrategy::ZerosFill),
            Some(requested),
            false,
        )
        .unwrap();

        assert_eq!(
            dependent.borrow().processed_range(),
            Some(DateRange::new(date(1, 5), date(1, 8)))
        );
    }

    #[test]
    fn test_disjoint_pair_is_invalid() {
        let mut pair = SeriesPair::new(series("mood", 1, 5), series("sleep", 10, 20));
        pair.update_calculation(
            Frequency::Daily,
            &RoleSettings::uniform(GroupingMethod::Average),
            &RoleSettings::uniform(FillStrategy::ZerosFill),
            None,
            false,
        )
        .unwrap();

        assert!(pair.bounds_for_date_range().is_none());
        assert!(!pair.is_valid());
    }

    #[test]
    fn test_single_member_pair() {
        let only = series("mood", 1, 10);
        let mut pair = SeriesPair::single(only.clone());
        assert_eq!(pair.members().len(), 1);

        let fill = RoleSettings::from([
            FillStrategy::NoFill,
            FillStrategy::ZerosFill,
            FillStrategy::ZerosFill,
        ]);
        pair.update_calculation(
            Frequency::Daily,
            &RoleSettings::uniform(GroupingMethod::Average),
            &fill,
            None,
            false,
        )
        .unwrap();
        assert_eq!(only.borrow().fill_strategy(), FillStrategy::NoFill);
        assert!(pair.is_valid());
    }
}
