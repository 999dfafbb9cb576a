//! Oura ring export
//!
//! Reads the newest `oura_YYYY-MM-DD*.json` in the integrations directory.
//! The export has top-level `readiness`, `sleep` and `activity` arrays with
//! one object per day keyed by `summary_date`. Known fields become series;
//! per-5-minute lists and hypnograms are not supported and are skipped.

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{SourceAdapter, SourceResult, SourceRows};
use crate::series::{Provenance, RingCategory, Score, VariableKind};

use RingCategory::{Activity, Readiness, Sleep};
use VariableKind::{Continuous, Duration, Time};

/// The one field whose readings of 0 and 1 are meaningful
const REST_MODE: &str = "Rest Mode State";

/// Export field -> series name and kind
const FIELDS: &[(RingCategory, &str, &str, VariableKind)] = &[
    (Readiness, "score", "Readiness Score", Continuous),
    (Readiness, "score_previous_night", "Readiness Score Factor: Previous Night's Sleep", Continuous),
    (Readiness, "score_sleep_balance", "Readiness Score Factor: Sleep Balance", Continuous),
    (Readiness, "score_previous_day", "Readiness Score Factor: Previous Day's Score", Continuous),
    (Readiness, "score_activity_balance", "Readiness Score Factor: Activity Balance", Continuous),
    (Readiness, "score_resting_hr", "Readiness Score Factor: Resting HR", Continuous),
    (Readiness, "score_hrv_balance", "Readiness Score Factor: HRV Balance", Continuous),
    (Readiness, "score_recovery_index", "Readiness Score Factor: Recovery Index", Continuous),
    (Readiness, "score_temperature", "Readiness Score Factor: Temperature", Continuous),
    (Readiness, "rest_mode_state", REST_MODE, Continuous),
    (Sleep, "bedtime_start", "Bedtime", Time),
    (Sleep, "bedtime_end", "Wake-Up Time", Time),
    (Sleep, "duration", "Sleep Duration", Duration),
    (Sleep, "total", "Total Sleep", Duration),
    (Sleep, "awake", "Time Awake", Duration),
    (Sleep, "rem", "Time in REM Sleep", Duration),
    (Sleep, "light", "Time in Light Sleep", Duration),
    (Sleep, "deep", "Time in Deep Sleep", Duration),
    (Sleep, "restless", "Time in Restless Sleep", Duration),
    (Sleep, "hr_lowest", "Lowest Sleeping Heart Rate", Continuous),
    (Sleep, "hr_average", "Average Sleeping Heart Rate", Continuous),
    (Sleep, "efficiency", "Sleep Efficiency", Continuous),
    (Sleep, "onset_latency", "Sleep Onset Latency", Continuous),
    (Sleep, "midpoint_time", "Sleep Midpoint Time", Duration),
    (Sleep, "temperature_delta", "Sleeping Temperature Delta", Continuous),
    (Sleep, "temperature_deviation", "Sleeping Temperature Deviation", Continuous),
    (Sleep, "temperature_trend_deviation", "Sleeping Temperature Deviation From Trend", Continuous),
    (Sleep, "breath_average", "Average Sleeping Breath Rate", Continuous),
    (Sleep, "score", "Sleep Score", Continuous),
    (Sleep, "score_total", "Sleep Score Factor: Total Sleep", Continuous),
    (Sleep, "score_rem", "Sleep Score Factor: REM Sleep", Continuous),
    (Sleep, "score_deep", "Sleep Score Factor: Deep Sleep", Continuous),
    (Sleep, "score_efficiency", "Sleep Score Factor: Efficiency", Continuous),
    (Sleep, "score_latency", "Sleep Score Factor: Latency", Continuous),
    (Sleep, "score_disturbances", "Sleep Score Factor: Disturbances", Continuous),
    (Sleep, "score_alignment", "Sleep Score Factor: Circadian Alignment", Continuous),
    (Sleep, "rmssd", "Average HRV From rMSSD", Continuous),
    (Activity, "score", "Activity Score", Continuous),
    (Activity, "score_stay_active", "Activity Score Factor: Stay Active", Continuous),
    (Activity, "score_move_every_hour", "Activity Score Factor: Move Every Hour", Continuous),
    (Activity, "score_meet_daily_targets", "Activity Score Factor: Meet Daily Targets", Continuous),
    (Activity, "score_training_frequency", "Activity Score Factor: Training Frequency", Continuous),
    (Activity, "score_training_volume", "Activity Score Factor: Training Volume", Continuous),
    (Activity, "score_recovery_time", "Activity Score Factor: Recovery Time", Continuous),
    (Activity, "daily_movement", "Daily Movement Equivalent in Meters", Continuous),
    (Activity, "non_wear", "Minutes With Ring Off", Continuous),
    (Activity, "rest", "Minutes Resting", Continuous),
    (Activity, "inactive", "Minutes Inactive", Continuous),
    (Activity, "inactivity_alerts", "Number of Inactivity Alerts", Continuous),
    (Activity, "low", "Minutes of Low Intensity Exercise", Continuous),
    (Activity, "medium", "Minutes of Medium Intensity Exercise", Continuous),
    (Activity, "high", "Minutes of High Intensity Exercise", Continuous),
    (Activity, "steps", "Number of Steps", Continuous),
    (Activity, "cal_total", "Total Calories Burned", Continuous),
    (Activity, "cal_active", "Active Calories Burned", Continuous),
    (Activity, "target_calories", "Target Calorie Burn", Continuous),
    (Activity, "target_km", "Target Distance (km)", Continuous),
    (Activity, "target_miles", "Target Distance (miles)", Continuous),
    (Activity, "to_target_km", "Deviation From Target Distance (km)", Continuous),
    (Activity, "to_target_miles", "Deviation From Target Distance (miles)", Continuous),
    (Activity, "to_target_calories", "Deviation From Target Calorie Burn", Continuous),
    (Activity, "met_min_inactive", "MET Minutes for Inactive Time", Continuous),
    (Activity, "met_min_low", "MET Minutes for Low Intensity Exercise", Continuous),
    (Activity, "met_min_medium", "MET Minutes for Medium Intensity Exercise", Continuous),
    (Activity, "met_min_medium_plus", "MET Minutes for Medium and High Intensity Exercise", Continuous),
    (Activity, "met_min_high", "MET Minutes for High Intensity Exercise", Continuous),
    (Activity, "average_met", "Average MET", Continuous),
    (Activity, "total", "Total Active Time", Continuous),
];

/// Position of a field in `FIELDS`, None for unsupported fields
fn field_index(category: RingCategory, field: &str) -> Option<usize> {
    FIELDS.iter().position(|(c, f, _, _)| *c == category && *f == field)
}

pub struct RingExport {
    dir: PathBuf,
}

impl RingExport {
    pub fn new(integrations_dir: &Path) -> Self {
        Self {
            dir: integrations_dir.to_path_buf(),
        }
    }

    /// Newest export by the date in its file name
    pub fn latest_export(&self) -> SourceResult<Option<PathBuf>> {
        if !self.dir.is_dir() {
            return Ok(None);
        }
        let pattern = Regex::new(r"^oura_(.{10}).*\.json$")?;

        let mut newest: Option<(NaiveDate, PathBuf)> = None;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(caps) = pattern.captures(file_name) else {
                continue;
            };
            let date = match NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d") {
                Ok(date) => date,
                Err(_) => {
                    warn!(file = file_name, "Ignoring Oura export without a valid date in its name");
                    continue;
                }
            };
            if newest.as_ref().map_or(true, |(d, _)| date > *d) {
                newest = Some((date, path));
            }
        }
        Ok(newest.map(|(_, path)| path))
    }
}

impl SourceAdapter for RingExport {
    fn name(&self) -> &str {
        "Oura Ring"
    }

    fn load(&self) -> SourceResult<Option<Vec<SourceRows>>> {
        let Some(path) = self.latest_export()? else {
            return Ok(None);
        };
        debug!(file = %path.display(), "Reading Oura export");
        let data: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        Ok(Some(parse_export(&data)))
    }
}

/// Series from a parsed export, in field-table order
fn parse_export(data: &Value) -> Vec<SourceRows> {
    let mut series: BTreeMap<usize, SourceRows> = BTreeMap::new();

    for category in RingCategory::all() {
        let Some(entries) = data.get(category.key()).and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            let Some(fields) = entry.as_object() else {
                continue;
            };
            let date = match fields
                .get("summary_date")
                .and_then(Value::as_str)
                .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            {
                Some(Ok(date)) => date,
                _ => {
                    warn!(category = category.key(), "Skipping Oura entry without a valid summary_date");
                    continue;
                }
            };

            for (field, value) in fields {
                let Some(index) = field_index(*category, field) else {
                    continue;
                };
                let (_, _, name, kind) = FIELDS[index];
                let Some(score) = reading(value, name, kind) else {
                    continue;
                };
                series
                    .entry(index)
                    .or_insert_with(|| SourceRows::new(name, kind, Provenance::Ring { category: *category }))
                    .push(date, score);
            }
        }
    }
    series.into_values().collect()
}

/// Score for one field value; None when the ring did not record it
fn reading(value: &Value, name: &str, kind: VariableKind) -> Option<Score> {
    match kind {
        VariableKind::Time => {
            let stamp = value.as_str()?;
            let time = NaiveTime::parse_from_str(stamp.get(11..19)?, "%H:%M:%S").ok()?;
            Some(Score::TimeOfDay(time))
        }
        _ => {
            let v = value.as_f64()?;
            if v <= 1.0 && name != REST_MODE {
                return None;
            }
            Some(Score::Value(v))
        }
    }
}
