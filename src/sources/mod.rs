//! Data sources
//!
//! Adapters that turn files on disk into series:
//! - Manual logs (one CSV per panel input)
//! - HabitBull habit-tracker export
//! - MyFitnessPal nutrition export
//! - Oura ring JSON export

mod habit;
mod manual;
mod nutrition;
mod ring;

pub use habit::HabitExport;
pub use manual::ManualLog;
pub use nutrition::NutritionExport;
pub use ring::RingExport;

use chrono::NaiveDate;
use std::path::Path;
use tracing::{info, warn};

use crate::config::{Config, Integration};
use crate::series::{Observation, Provenance, Score, Series, SeriesError, SeriesRegistry, VariableKind};

/// Common trait for all data sources
pub trait SourceAdapter {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Read every series this source provides.
    ///
    /// `Ok(None)` means the export file is absent, which is not an error.
    fn load(&self) -> SourceResult<Option<Vec<SourceRows>>>;
}

/// Readings for one series as read from a source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRows {
    pub name: String,
    pub kind: VariableKind,
    pub provenance: Provenance,
    pub rows: Vec<Observation>,
}

impl SourceRows {
    pub fn new(name: impl Into<String>, kind: VariableKind, provenance: Provenance) -> Self {
        Self {
            name: name.into(),
            kind,
            provenance,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, date: NaiveDate, score: Score) {
        self.rows.push(Observation::new(date, score));
    }

    pub fn into_series(self) -> Series {
        Series::new(self.name, self.kind, self.provenance, self.rows)
    }
}

/// Source errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("{file}, line {line}: {message}")]
    Parse {
        file: String,
        line: u64,
        message: String,
    },

    #[error("Missing column '{column}' in {file}")]
    MissingColumn { file: String, column: String },

    #[error(transparent)]
    Series(#[from] SeriesError),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Run the configured panels and enabled integrations and register every
/// series they produce under its category.
///
/// A source that fails to load is logged and skipped. Returns the number of
/// series registered.
pub fn load_all(config: &Config, registry: &mut SeriesRegistry) -> usize {
    let integrations_dir = Path::new(&config.data.integrations_dir);
    let mut adapters: Vec<Box<dyn SourceAdapter>> = config
        .panels
        .iter()
        .map(|panel| Box::new(ManualLog::new(&config.data.data_dir, panel.clone())) as Box<dyn SourceAdapter>)
        .collect();
    if config.integration_enabled(Integration::Oura) {
        adapters.push(Box::new(RingExport::new(integrations_dir)));
    }
    if config.integration_enabled(Integration::MyFitnessPal) {
        adapters.push(Box::new(NutritionExport::new(integrations_dir)));
    }
    if config.integration_enabled(Integration::HabitBull) {
        adapters.push(Box::new(HabitExport::new(integrations_dir)));
    }

    let mut registered = 0;
    for adapter in &adapters {
        let sources = match adapter.load() {
            Ok(Some(sources)) => sources,
            Ok(None) => {
                info!(source = adapter.name(), "No export found");
                continue;
            }
            Err(e) => {
                warn!(source = adapter.name(), error = %e, "Failed to load source");
                continue;
            }
        };

        let count = sources.len();
        for rows in sources {
            let category = rows.provenance.category_name().to_string();
            if let Err(e) = registry.add_to_category(&category, rows.into_series()) {
                warn!(source = adapter.name(), error = %e, "Skipped series");
                continue;
            }
            registered += 1;
        }
        info!(source = adapter.name(), series = count, "Loaded source");
    }
    registered
}

/// Index of a named column in a CSV header
pub(crate) fn column_index(headers: &csv::StringRecord, column: &str, file: &Path) -> SourceResult<usize> {
    headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| SourceError::MissingColumn {
            file: file.display().to_string(),
            column: column.to_string(),
        })
}

/// Parse error tied to a CSV record's position
pub(crate) fn parse_error(file: &Path, record: &csv::StringRecord, message: impl Into<String>) -> SourceError {
    SourceError::Parse {
        file: file.display().to_string(),
        line: record.position().map(|p| p.line()).unwrap_or(0),
        message: message.into(),
    }
}

pub(crate) fn parse_date(value: &str, format: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), format).map_err(|e| format!("invalid date '{}': {}", value, e))
}
