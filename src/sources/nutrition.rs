//! MyFitnessPal export
//!
//! `MFPData.csv` has one row per meal. Every nutrient column becomes a
//! continuous series; meals on the same day are summed when the series is
//! processed.

use std::path::{Path, PathBuf};
use tracing::warn;

use super::{column_index, parse_date, parse_error, SourceAdapter, SourceResult, SourceRows};
use crate::series::{Provenance, Score, VariableKind};

pub const NUTRITION_FILE: &str = "MFPData.csv";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Nutrient columns read from the export
pub const NUTRIENTS: [&str; 6] = ["Calories", "Carbohydrates", "Fat", "Protein", "Sodium", "Sugar"];

pub struct NutritionExport {
    path: PathBuf,
}

impl NutritionExport {
    pub fn new(integrations_dir: &Path) -> Self {
        Self {
            path: integrations_dir.join(NUTRITION_FILE),
        }
    }
}

impl SourceAdapter for NutritionExport {
    fn name(&self) -> &str {
        "MyFitnessPal"
    }

    fn load(&self) -> SourceResult<Option<Vec<SourceRows>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;
        let headers = reader.headers()?.clone();
        let date_col = column_index(&headers, "Date", &self.path)?;
        let columns = NUTRIENTS
            .iter()
            .map(|n| column_index(&headers, n, &self.path))
            .collect::<SourceResult<Vec<usize>>>()?;

        let mut sources: Vec<SourceRows> = NUTRIENTS
            .iter()
            .map(|n| SourceRows::new(*n, VariableKind::Continuous, Provenance::Nutrition))
            .collect();

        for result in reader.records() {
            let record = result?;
            let date = match parse_date(record.get(date_col).unwrap_or(""), DATE_FORMAT) {
                Ok(date) => date,
                Err(message) => {
                    warn!("{}", parse_error(&self.path, &record, message));
                    continue;
                }
            };

            for (rows, col) in sources.iter_mut().zip(&columns) {
                let cell = record.get(*col).unwrap_or("").trim();
                if cell.is_empty() {
                    continue;
                }
                match cell.parse::<f64>() {
                    Ok(value) => rows.push(date, Score::Value(value)),
                    Err(_) => warn!(
                        "{}",
                        parse_error(&self.path, &record, format!("invalid {} '{}'", rows.name, cell))
                    ),
                }
            }
        }
        Ok(Some(sources))
    }
}
