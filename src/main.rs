//! lagscope CLI
//!
//! Command-line interface for lagscope:
//! - Log values to a manual panel
//! - List and inspect loaded series
//! - Run lag tests between two series
//! - Build a relationship matrix for a category

use anyhow::{bail, Context, Result};
use chrono::{Duration, Local, NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lagscope::config::{generate_default_config, Config, LoggingConfig};
use lagscope::series::{
    DateRange, FillStrategy, Frequency, GroupingMethod, RoleSettings, Score, Series, SeriesPair,
    SeriesRegistry, SharedSeries, VariableKind,
};
use lagscope::sources::{load_all, ManualLog};
use lagscope::stats::{relationship_matrix, LagTest, RangeOutcome, TestKind, INVALID};

#[derive(Parser)]
#[command(name = "lagscope")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Lagged relationships between personal tracking variables")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.config/lagscope/config.toml or ./lagscope.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

/// Processing options shared by the analysis commands
#[derive(clap::Args, Debug, Clone)]
pub struct ProcessingArgs {
    /// Frequency (daily, weekly, monthly)
    #[arg(long)]
    pub frequency: Option<String>,
    /// Grouping for weekly/monthly buckets (average, sum)
    #[arg(long)]
    pub grouping: Option<String>,
    /// Fill strategy (zeros, mean_excluding, mean_including, forward, backward, none)
    #[arg(long)]
    pub fill: Option<String>,
    /// First day of the window (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,
    /// Last day of the window (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log a value to a manual panel
    Log {
        /// Panel name
        panel: String,
        /// Input name within the panel
        input: String,
        /// Value; HH:MM for time-of-day panels
        value: String,
        /// Day of the reading: "today", "yesterday" or YYYY-MM-DD
        #[arg(short, long, default_value = "today")]
        date: String,
    },

    /// List loaded series by category
    List {
        /// Only this category
        category: Option<String>,
    },

    /// Show one series' processed values
    Show {
        name: String,
        #[command(flatten)]
        processing: ProcessingArgs,
    },

    /// Run a lag test between two series
    Test {
        /// Series that may be affected
        dependent: String,
        /// Series that may be the cause
        independent: String,
        /// Test name (pearson, granger, impact)
        #[arg(short, long)]
        test: Option<String>,
        #[arg(long)]
        min_lag: Option<usize>,
        #[arg(long)]
        max_lag: Option<usize>,
        #[command(flatten)]
        processing: ProcessingArgs,
    },

    /// Effect sizes between every pair of analyzable series
    Matrix {
        /// Only series in this category
        #[arg(long)]
        category: Option<String>,
        /// Test name (pearson, granger, impact)
        #[arg(short, long)]
        test: Option<String>,
        #[arg(short, long, default_value = "0")]
        lag: usize,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path).with_context(|| format!("Failed to load config {:?}", path))?,
        None => Config::load_default(),
    };
    init_logging(&config.logging);
    tracing::debug!("lagscope v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }

        Commands::Log {
            panel,
            input,
            value,
            date,
        } => {
            let panel_config = config
                .panel(&panel)
                .with_context(|| format!("No panel named '{}' in the config", panel))?
                .clone();
            if !panel_config.inputs.contains(&input) {
                bail!("Panel '{}' has no input '{}'", panel, input);
            }

            let kind = panel_config.kind;
            let has_time = panel_config.has_time;
            let score = parse_score(&value, kind)?;
            let day = parse_day(&date)?;
            let time = has_time.then(|| Local::now().time());

            let log = ManualLog::new(&config.data.data_dir, panel_config);
            log.append(&input, score, day, time)
                .with_context(|| format!("Failed to log {}/{}", panel, input))?;
            println!("Logged {} = {} on {}", input, score, day);
        }

        Commands::List { category } => {
            let registry = load_registry(&config);
            let categories = match category {
                Some(category) => vec![category],
                None => registry.categories(),
            };

            if cli.format == "json" {
                let listing: Vec<serde_json::Value> = categories
                    .iter()
                    .flat_map(|c| registry.category(c).into_iter().map(move |s| summary_json(c, &s.borrow())))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&listing)?);
                return Ok(());
            }

            for category in &categories {
                println!("{}", category);
                println!("{}", "-".repeat(72));
                for series in registry.category(category) {
                    let series = series.borrow();
                    println!(
                        "  {:<36} {:<11} {:>6} {:>8} {:>8}",
                        series.name(),
                        series.kind().to_string(),
                        series.processed().len(),
                        series.mean_string(),
                        series.stdev_string()
                    );
                }
                println!();
            }
        }

        Commands::Show { name, processing } => {
            let registry = load_registry(&config);
            let handle = registry.get(&name)?;
            let mut pair = SeriesPair::single(handle.clone());
            recompute(&mut pair, &config, &processing)?;

            let series = handle.borrow();
            if cli.format == "json" {
                let rows: Vec<serde_json::Value> = series
                    .selected_dates()
                    .iter()
                    .zip(series.selected_values())
                    .map(|(date, score)| serde_json::json!({ "date": date, "score": score }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }

            println!("{} ({}, {}, {})", series.name(), series.kind(), series.frequency(), series.fill_strategy());
            for (date, score) in series.selected_dates().iter().zip(series.selected_values()) {
                println!("  {}  {}", date, score);
            }
            println!();
            println!("Mean: {}  Stdev: {}", series.mean_string(), series.stdev_string());
            if series.selected_range_has_missing() {
                println!("(window contains days without data)");
            }
        }

        Commands::Test {
            dependent,
            independent,
            test,
            min_lag,
            max_lag,
            processing,
        } => {
            let registry = load_registry(&config);
            let test = match test {
                Some(name) => name.parse::<TestKind>()?,
                None => config.analysis.test,
            };
            let min_lag = min_lag.unwrap_or(config.analysis.min_lag).max(test.min_lag());
            let max_lag = max_lag.unwrap_or(config.analysis.max_lag);

            let mut pair = SeriesPair::new(registry.get(&dependent)?, registry.get(&independent)?);
            recompute(&mut pair, &config, &processing)?;
            if !pair.is_valid() {
                bail!("'{}' and '{}' share no days of data", dependent, independent);
            }

            let dep = pair.dependent().borrow();
            let ind = pair
                .independent()
                .context("Pair has no independent series")?
                .borrow();
            let runner = test.build(&dep, &ind);
            let outcome = runner.run_over_range(&dep, &ind, min_lag, max_lag)?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                return Ok(());
            }

            println!("{}: {} -> {}", runner.display_name(), ind.name(), dep.name());
            match &outcome {
                RangeOutcome::Insufficient { reason } => println!("  {}", reason),
                RangeOutcome::Scored { .. } => {
                    println!("  {:<14} {:>12} {:>12}", format!("Lag ({})", dep.frequency().quantity_label()), "Effect", "p-value");
                    for score in outcome.scores() {
                        println!(
                            "  {:<14} {:>12} {:>12}",
                            score.lag,
                            format_number(score.effect_size),
                            format_number(score.p_value)
                        );
                    }
                }
            }
        }

        Commands::Matrix {
            category,
            test,
            lag,
        } => {
            let registry = load_registry(&config);
            let test = match test {
                Some(name) => name.parse::<TestKind>()?,
                None => config.analysis.test,
            };
            let series = match &category {
                Some(category) => registry.analyzable_in(category),
                None => registry.analyzable(),
            };
            if series.is_empty() {
                bail!("No analyzable series found");
            }

            let matrix = relationship_matrix(&series, test, lag);
            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&matrix.to_long_form())?);
                return Ok(());
            }

            println!("{} at lag {} (row = dependent, column = independent)", test, lag);
            for (i, name) in matrix.names.iter().enumerate() {
                let row: Vec<String> = matrix.values[i].iter().map(|v| format!("{:>7.3}", v)).collect();
                println!("  {:>3} {:<32} {}", i, truncate(name, 32), row.join(" "));
            }
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_registry(config: &Config) -> SeriesRegistry {
    let mut registry = SeriesRegistry::new();
    let count = load_all(config, &mut registry);
    tracing::info!(series = count, "Loaded series");
    registry
}

/// Recompute a pair with CLI settings, falling back to the config
fn recompute(pair: &mut SeriesPair, config: &Config, args: &ProcessingArgs) -> Result<()> {
    let frequency = match &args.frequency {
        Some(s) => s.parse::<Frequency>()?,
        None => config.analysis.frequency,
    };
    let grouping = match &args.grouping {
        Some(s) => s.parse::<GroupingMethod>()?,
        None => config.analysis.grouping,
    };
    let fill = match &args.fill {
        Some(s) => Some(s.parse::<FillStrategy>()?),
        None => config.analysis.fill,
    };
    let range = match (args.from, args.to) {
        (Some(start), Some(end)) => {
            Some(DateRange::try_new(start, end).with_context(|| format!("{} is after {}", start, end))?)
        }
        (None, None) => None,
        _ => bail!("--from and --to must be given together"),
    };

    let grouping = role_settings(pair, |series| {
        if GroupingMethod::supported_for(series.kind()).contains(&grouping) {
            grouping
        } else {
            GroupingMethod::Average
        }
    });
    let fill = role_settings(pair, |series| match fill {
        Some(fill) if FillStrategy::supported_for(series.kind()).contains(&fill) => fill,
        _ => FillStrategy::default_for(series.kind()),
    });

    pair.update_calculation(frequency, &grouping, &fill, range, false)?;
    Ok(())
}

/// Per-role setting chosen from each member
fn role_settings<T: Copy>(pair: &SeriesPair, choose: impl Fn(&Series) -> T) -> RoleSettings<T> {
    let pick = |handle: &SharedSeries| choose(&handle.borrow());
    let dependent = pick(pair.dependent());
    let independent = pair.independent().map(pick).unwrap_or(dependent);
    RoleSettings {
        single: dependent,
        independent,
        dependent,
    }
}

fn parse_score(value: &str, kind: VariableKind) -> Result<Score> {
    match kind {
        VariableKind::Time => {
            let time = NaiveTime::parse_from_str(value, "%H:%M")
                .with_context(|| format!("Expected a time of day (HH:MM), got '{}'", value))?;
            Ok(Score::TimeOfDay(time))
        }
        _ => {
            let v: f64 = value
                .parse()
                .with_context(|| format!("Expected a number, got '{}'", value))?;
            Ok(Score::Value(v))
        }
    }
}

fn parse_day(value: &str) -> Result<NaiveDate> {
    let today = Local::now().date_naive();
    match value {
        "today" => Ok(today),
        "yesterday" => Ok(today - Duration::days(1)),
        s => NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Invalid date: {}", s)),
    }
}

fn summary_json(category: &str, series: &Series) -> serde_json::Value {
    serde_json::json!({
        "category": category,
        "name": series.name(),
        "kind": series.kind(),
        "points": series.processed().len(),
        "range": series.raw_span().map(|r| r.to_string()),
        "mean": series.mean_string(),
        "stdev": series.stdev_string(),
    })
}

fn format_number(value: f64) -> String {
    if value == INVALID {
        "n/a".to_string()
    } else if value != 0.0 && value.abs() < 1e-3 {
        format!("{:.2e}", value)
    } else {
        format!("{:.4}", value)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max - 3).collect();
        format!("{}...", cut)
    }
}
