//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::series::{FillStrategy, Frequency, GroupingMethod, VariableKind};
use crate::stats::TestKind;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Manual-log panels
    #[serde(default)]
    pub panels: Vec<PanelConfig>,
}

/// Where logged data and integration exports live
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_integrations_dir")]
    pub integrations_dir: String,

    #[serde(default)]
    pub integrations: Vec<Integration>,
}

/// Export-file integrations that can be switched on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Integration {
    Oura,
    MyFitnessPal,
    HabitBull,
}

fn default_base_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("lagscope"))
        .unwrap_or_else(|| PathBuf::from("./lagscope_data"))
}

fn default_data_dir() -> String {
    default_base_dir().join("logs").to_string_lossy().to_string()
}

fn default_integrations_dir() -> String {
    default_base_dir()
        .join("integrations")
        .to_string_lossy()
        .to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            integrations_dir: default_integrations_dir(),
            integrations: Vec::new(),
        }
    }
}

/// Defaults for recomputation and lag tests
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Fill strategy for every series; unset keeps each kind's default
    #[serde(default)]
    pub fill: Option<FillStrategy>,

    #[serde(default = "default_frequency")]
    pub frequency: Frequency,

    #[serde(default = "default_grouping")]
    pub grouping: GroupingMethod,

    #[serde(default)]
    pub min_lag: usize,

    #[serde(default = "default_max_lag")]
    pub max_lag: usize,

    #[serde(default = "default_test")]
    pub test: TestKind,
}

fn default_frequency() -> Frequency {
    Frequency::Daily
}

fn default_grouping() -> GroupingMethod {
    GroupingMethod::Average
}

fn default_max_lag() -> usize {
    7
}

fn default_test() -> TestKind {
    TestKind::Pearson
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fill: None,
            frequency: default_frequency(),
            grouping: default_grouping(),
            min_lag: 0,
            max_lag: default_max_lag(),
            test: default_test(),
        }
    }
}

/// A group of manually logged variables sharing one kind
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PanelConfig {
    pub name: String,

    pub kind: VariableKind,

    /// One series per input, stored as `<data_dir>/<panel>/<input>.csv`
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Whether entries carry the time they were logged
    #[serde(default)]
    pub has_time: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("lagscope").join("config.toml")),
            Some(PathBuf::from("./lagscope.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Find a panel by name
    pub fn panel(&self, name: &str) -> Option<&PanelConfig> {
        self.panels.iter().find(|p| p.name == name)
    }

    pub fn integration_enabled(&self, integration: Integration) -> bool {
        self.data.integrations.contains(&integration)
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(data_dir) = std::env::var("LAGSCOPE_DATA_DIR") {
            self.data.data_dir = data_dir;
        }
        if let Ok(dir) = std::env::var("LAGSCOPE_INTEGRATIONS_DIR") {
            self.data.integrations_dir = dir;
        }

        if let Ok(level) = std::env::var("LAGSCOPE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LAGSCOPE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# lagscope configuration
#
# Environment variables override these settings:
# - LAGSCOPE_DATA_DIR
# - LAGSCOPE_INTEGRATIONS_DIR
# - LAGSCOPE_LOG_LEVEL
# - LAGSCOPE_LOG_FORMAT

[data]
# Directory holding one folder of CSV logs per panel
data_dir = "~/.local/share/lagscope/logs"

# Directory holding integration exports
# (oura_YYYY-MM-DD.json, MFPData.csv, habitBullData.csv)
integrations_dir = "~/.local/share/lagscope/integrations"

# Enabled integrations: oura, myfitnesspal, habitbull
integrations = []

[analysis]
# Fill strategy: zeros_fill, mean_excluding_missing, mean_including_missing,
# forward_fill, backward_fill, no_fill. Leave unset for per-kind defaults.
# fill = "zeros_fill"

# Frequency: daily, weekly, monthly
frequency = "daily"

# Grouping for weekly/monthly buckets: average, sum
grouping = "average"

# Lag window searched by `lagscope test`
min_lag = 0
max_lag = 7

# Default test: pearson, granger, impact
test = "pearson"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json
format = "pretty"

# Manual-log panels. Each input is stored in <data_dir>/<panel>/<input>.csv
# kind: continuous, binary, time, duration
[[panels]]
name = "Mood"
kind = "continuous"
inputs = ["Mood", "Energy"]
has_time = true
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();

        assert_eq!(config.analysis.frequency, Frequency::Daily);
        assert_eq!(config.analysis.test, TestKind::Pearson);
        assert_eq!(config.analysis.max_lag, 7);
        assert!(config.analysis.fill.is_none());
        assert_eq!(config.panels.len(), 1);
        assert_eq!(config.panels[0].kind, VariableKind::Continuous);
        assert!(config.panels[0].has_time);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [data]
            integrations = ["oura", "habitbull"]

            [analysis]
            fill = "forward_fill"
            frequency = "weekly"
            test = "granger"
            "#,
        )
        .unwrap();

        assert!(config.integration_enabled(Integration::Oura));
        assert!(config.integration_enabled(Integration::HabitBull));
        assert!(!config.integration_enabled(Integration::MyFitnessPal));
        assert_eq!(config.analysis.fill, Some(FillStrategy::ForwardFill));
        assert_eq!(config.analysis.frequency, Frequency::Weekly);
        assert_eq!(config.analysis.grouping, GroupingMethod::Average);
        assert_eq!(config.analysis.test, TestKind::Granger);
        assert_eq!(config.logging.level, "info");
        assert!(config.panels.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lagscope.toml");
        std::fs::write(
            &path,
            r#"
            [[panels]]
            name = "Sleep"
            kind = "time"
            inputs = ["Bedtime"]
            "#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        let panel = config.panel("Sleep").unwrap();
        assert_eq!(panel.kind, VariableKind::Time);
        assert_eq!(panel.inputs, vec!["Bedtime".to_string()]);
        assert!(!panel.has_time);
        assert!(config.panel("Mood").is_none());
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[analysis]\nfrequency = \"hourly\"\n").unwrap();
        assert!(matches!(Config::load(&bad), Err(ConfigError::Parse { .. })));
    }
}
