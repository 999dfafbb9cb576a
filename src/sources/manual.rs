//! Manual logs
//!
//! Each panel input is kept in `<data_dir>/<panel>/<input>.csv` with a
//! `Date,Score` or `Date,Time,Score` header. Dates are `%m/%d/%Y`, times
//! `%H:%M`; time-of-day scores use the time format as well.

use chrono::{NaiveDate, NaiveTime};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing::{debug, warn};

use super::{column_index, parse_date, parse_error, SourceAdapter, SourceResult, SourceRows};
use crate::config::PanelConfig;
use crate::series::{Observation, Provenance, Score, SeriesError, VariableKind};

const DATE_FORMAT: &str = "%m/%d/%Y";
const TIME_FORMAT: &str = "%H:%M";

/// Reader and appender for one panel's CSV logs
pub struct ManualLog {
    data_dir: PathBuf,
    panel: PanelConfig,
}

impl ManualLog {
    pub fn new(data_dir: impl Into<PathBuf>, panel: PanelConfig) -> Self {
        Self {
            data_dir: data_dir.into(),
            panel,
        }
    }

    pub fn panel(&self) -> &PanelConfig {
        &self.panel
    }

    pub fn input_path(&self, input: &str) -> PathBuf {
        self.data_dir.join(&self.panel.name).join(format!("{}.csv", input))
    }

    /// Append one reading, creating the panel directory and header as needed
    pub fn append(&self, input: &str, score: Score, date: NaiveDate, time: Option<NaiveTime>) -> SourceResult<()> {
        if score.is_missing() || !score.fits(self.panel.kind) {
            return Err(SeriesError::KindMismatch {
                series: input.to_string(),
                kind: self.panel.kind,
                score: score.to_string(),
            }
            .into());
        }

        let path = self.input_path(input);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let is_new = !path.exists();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        if is_new {
            if self.panel.has_time {
                writer.write_record(["Date", "Time", "Score"])?;
            } else {
                writer.write_record(["Date", "Score"])?;
            }
        }

        let date_cell = date.format(DATE_FORMAT).to_string();
        let score_cell = format_score(score);
        if self.panel.has_time {
            let time_cell = time.map(|t| t.format(TIME_FORMAT).to_string()).unwrap_or_default();
            writer.write_record([date_cell, time_cell, score_cell])?;
        } else {
            writer.write_record([date_cell, score_cell])?;
        }
        writer.flush()?;

        debug!(panel = %self.panel.name, input, %date, "Appended manual entry");
        Ok(())
    }

    fn read_input(&self, input: &str) -> SourceResult<Vec<Observation>> {
        let path = self.input_path(input);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&path)?;
        let headers = reader.headers()?.clone();
        let date_col = column_index(&headers, "Date", &path)?;
        let score_col = column_index(&headers, "Score", &path)?;
        let time_col = headers.iter().position(|h| h.trim() == "Time");

        let mut observations = Vec::new();
        let mut failed = 0usize;
        for result in reader.records() {
            let record = result?;
            match parse_row(&record, date_col, score_col, time_col, self.panel.kind) {
                Ok(Some(obs)) => observations.push(obs),
                Ok(None) => {}
                Err(message) => {
                    failed += 1;
                    warn!("{}", parse_error(&path, &record, message));
                }
            }
        }
        if failed > 0 {
            warn!(file = %path.display(), failed, "Skipped unreadable rows");
        }
        Ok(observations)
    }
}

impl SourceAdapter for ManualLog {
    fn name(&self) -> &str {
        &self.panel.name
    }

    /// Inputs without a log file yet become empty series
    fn load(&self) -> SourceResult<Option<Vec<SourceRows>>> {
        let mut sources = Vec::with_capacity(self.panel.inputs.len());
        for input in &self.panel.inputs {
            let mut rows = SourceRows::new(
                input.clone(),
                self.panel.kind,
                Provenance::Manual {
                    panel: self.panel.name.clone(),
                },
            );
            rows.rows = self.read_input(input)?;
            sources.push(rows);
        }
        Ok(Some(sources))
    }
}

/// One log row; `Ok(None)` for a row without a score
fn parse_row(
    record: &csv::StringRecord,
    date_col: usize,
    score_col: usize,
    time_col: Option<usize>,
    kind: VariableKind,
) -> Result<Option<Observation>, String> {
    let score_cell = record.get(score_col).unwrap_or("").trim();
    if score_cell.is_empty() {
        return Ok(None);
    }

    let date = parse_date(record.get(date_col).unwrap_or(""), DATE_FORMAT)?;
    let score = parse_score(score_cell, kind)?;
    let mut obs = Observation::new(date, score);
    if let Some(cell) = time_col.and_then(|c| record.get(c)).map(str::trim) {
        if !cell.is_empty() {
            obs = obs.at(parse_time(cell)?);
        }
    }
    Ok(Some(obs))
}

fn parse_score(cell: &str, kind: VariableKind) -> Result<Score, String> {
    match kind {
        VariableKind::Time => parse_time(cell).map(Score::TimeOfDay),
        _ => cell
            .parse::<f64>()
            .map(Score::Value)
            .map_err(|_| format!("invalid score '{}'", cell)),
    }
}

fn parse_time(cell: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(cell, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(cell, "%H:%M:%S"))
        .map_err(|_| format!("invalid time '{}'", cell))
}

fn format_score(score: Score) -> String {
    match score {
        Score::Value(v) => v.to_string(),
        Score::TimeOfDay(t) => t.format(TIME_FORMAT).to_string(),
        Score::Missing => String::new(),
    }
}
