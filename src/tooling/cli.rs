//! CLI Tooling
//!
//! Command-line interface: runs the rescue robot simulation and shows the
//! effective configuration.

use crate::config::{ConfigLoader, RuntimeConfig};
use crate::logging::LoggingConfig;
use crate::tooling::simulation::{run_simulation, SimulationReport};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

/// GoalEDP CLI - explainable goal-directed event processing
#[derive(Parser)]
#[command(name = "goaledp")]
#[command(about = "Goal-directed event processing with causal explanations")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the rescue robot scenario on synthetic sensor events
    Simulate {
        /// Number of deliberation ticks
        #[arg(long, default_value = "100")]
        ticks: usize,
        /// Seed of the sensor feed
        #[arg(long, default_value = "0")]
        seed: u64,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the effective configuration
    Config {
        /// Output format (text or json)
        #[arg(long, default_value = "json")]
        format: String,
    },
}

impl Cli {
    /// Logging configuration with the command-line overrides applied
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut logging = base.clone();
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            logging.file = Some(file.clone());
        }
        logging
    }
}

/// CLI context holding the loaded configuration
pub struct CliContext {
    config: RuntimeConfig,
}

impl CliContext {
    pub fn new(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = ConfigLoader::load(config_path.as_deref())
            .context("failed to load configuration")?;
        Ok(Self { config })
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Execute a CLI command
    pub async fn execute(&self, command: &Commands) -> anyhow::Result<String> {
        match command {
            Commands::Simulate {
                ticks,
                seed,
                format,
            } => {
                let json = parse_format(format)?;
                info!(ticks, seed, "Starting simulation");
                let report = run_simulation(*ticks, *seed, &self.config).await?;
                if json {
                    Ok(serde_json::to_string_pretty(&report)?)
                } else {
                    Ok(format_report_text(&report))
                }
            }
            Commands::Config { format } => {
                if parse_format(format)? {
                    Ok(serde_json::to_string_pretty(&self.config)?)
                } else {
                    Ok(format!("{:#?}", self.config))
                }
            }
        }
    }
}

/// `true` for json, `false` for text
fn parse_format(format: &str) -> anyhow::Result<bool> {
    match format {
        "json" => Ok(true),
        "text" => Ok(false),
        other => bail!("unknown format '{}', expected text or json", other),
    }
}

fn short(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 60 {
        let cut: String = text.chars().take(57).collect();
        format!("{}...", cut)
    } else {
        text
    }
}

/// Format a simulation report as human-readable text
pub fn format_report_text(report: &SimulationReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Simulation: {} ticks, seed {}, {} events recorded\n\n",
        report.ticks, report.seed, report.events_recorded
    ));

    let mut runs = Table::new();
    runs.load_preset(UTF8_FULL);
    runs.set_header(vec!["Action", "Successful runs"]);
    for (topic, count) in &report.action_runs {
        runs.add_row(vec![topic.clone(), count.to_string()]);
    }
    out.push_str(&runs.to_string());
    out.push('\n');

    let Some(action) = &report.last_action else {
        out.push_str("\nNo action was executed.\n");
        return out;
    };
    out.push_str(&format!(
        "\nLast action: {} = {} (t={})\n\nCauses:\n",
        action.topic,
        short(&action.value),
        action.time
    ));

    let mut causes = Table::new();
    causes.load_preset(UTF8_FULL);
    causes.set_header(vec!["Topic", "Value", "Init time", "Time"]);
    for cause in &report.causes {
        causes.add_row(vec![
            cause.topic.clone(),
            short(&cause.value),
            cause.init_time.to_string(),
            cause.time.to_string(),
        ]);
    }
    out.push_str(&causes.to_string());
    out.push_str("\n\nPossible causes:\n");

    let mut possible = Table::new();
    possible.load_preset(UTF8_FULL);
    possible.set_header(vec!["Topic", "Value", "Probability"]);
    for (topic, by_hash) in &report.possible_causes {
        for (hash, probability) in by_hash {
            let value = report
                .values
                .get(hash)
                .map(short)
                .unwrap_or_else(|| hash.clone());
            possible.add_row(vec![topic.clone(), value, format!("{:.3}", probability)]);
        }
    }
    out.push_str(&possible.to_string());
    out.push('\n');
    out
}
