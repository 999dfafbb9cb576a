//! HabitBull export
//!
//! `habitBullData.csv` holds every habit in one table with `HabitName`,
//! `CalendarDate` (`%m/%d/%Y`) and `Value` columns.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::{column_index, parse_date, parse_error, SourceAdapter, SourceResult, SourceRows};
use crate::series::{Provenance, Score, VariableKind};

pub const HABIT_FILE: &str = "habitBullData.csv";
const DATE_FORMAT: &str = "%m/%d/%Y";

pub struct HabitExport {
    path: PathBuf,
}

impl HabitExport {
    pub fn new(integrations_dir: &Path) -> Self {
        Self {
            path: integrations_dir.join(HABIT_FILE),
        }
    }
}

impl SourceAdapter for HabitExport {
    fn name(&self) -> &str {
        "HabitBull"
    }

    /// One series per habit name. A habit with at most two distinct values
    /// is binary.
    fn load(&self) -> SourceResult<Option<Vec<SourceRows>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;
        let headers = reader.headers()?.clone();
        let name_col = column_index(&headers, "HabitName", &self.path)?;
        let date_col = column_index(&headers, "CalendarDate", &self.path)?;
        let value_col = column_index(&headers, "Value", &self.path)?;

        let mut habits: BTreeMap<String, Vec<(chrono::NaiveDate, f64)>> = BTreeMap::new();
        for result in reader.records() {
            let record = result?;
            let name = record.get(name_col).unwrap_or("").trim();
            if name.is_empty() {
                continue;
            }
            let parsed = parse_date(record.get(date_col).unwrap_or(""), DATE_FORMAT).and_then(|date| {
                let cell = record.get(value_col).unwrap_or("").trim();
                cell.parse::<f64>()
                    .map(|v| (date, v))
                    .map_err(|_| format!("invalid value '{}'", cell))
            });
            match parsed {
                Ok(reading) => habits.entry(name.to_string()).or_default().push(reading),
                Err(message) => warn!("{}", parse_error(&self.path, &record, message)),
            }
        }

        let sources = habits
            .into_iter()
            .map(|(name, readings)| {
                let mut rows = SourceRows::new(name, habit_kind(&readings), Provenance::Habit);
                for (date, value) in readings {
                    rows.push(date, Score::Value(value));
                }
                rows
            })
            .collect();
        Ok(Some(sources))
    }
}

fn habit_kind(readings: &[(chrono::NaiveDate, f64)]) -> VariableKind {
    let mut distinct: Vec<f64> = readings.iter().map(|(_, v)| *v).collect();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    if distinct.len() <= 2 {
        VariableKind::Binary
    } else {
        VariableKind::Continuous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_groups_by_habit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(HABIT_FILE),
            "HabitName,CalendarDate,Value,CommentText\n\
             Meditate,03/01/2024,1,\n\
             Pushups,03/01/2024,20,felt good\n\
             Meditate,03/02/2024,0,\n\
             Pushups,03/02/2024,25,\n\
             Pushups,03/03/2024,30,\n\
             Meditate,03/03/2024,1,\n",
        )
        .unwrap();

        let sources = HabitExport::new(dir.path()).load().unwrap().unwrap();
        assert_eq!(sources.len(), 2);

        assert_eq!(sources[0].name, "Meditate");
        assert_eq!(sources[0].kind, VariableKind::Binary);
        assert_eq!(sources[0].provenance, Provenance::Habit);
        assert_eq!(sources[0].rows.len(), 3);

        assert_eq!(sources[1].name, "Pushups");
        assert_eq!(sources[1].kind, VariableKind::Continuous);
        assert_eq!(sources[1].rows[2].date, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
        assert_eq!(sources[1].rows[2].score, Score::Value(30.0));
    }

    #[test]
    fn test_missing_export() {
        let dir = tempfile::tempdir().unwrap();
        assert!(HabitExport::new(dir.path()).load().unwrap().is_none());
    }

    #[test]
    fn test_bad_rows_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(HABIT_FILE),
            "HabitName,CalendarDate,Value\nRead,03/01/2024,1\nRead,March 2,1\nRead,03/03/2024,x\n",
        )
        .unwrap();

        let sources = HabitExport::new(dir.path()).load().unwrap().unwrap();
        assert_eq!(sources[0].rows.len(), 1);
    }
}
