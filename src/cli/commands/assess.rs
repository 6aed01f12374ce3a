//! Assess command implementation
//!
//! Evaluates re-identification risk of a dataset as it is, without applying
//! any technique.

use super::{load_or_report, read_dataset};
use clap::Args;
use std::path::PathBuf;

/// Arguments for the assess command
#[derive(Args, Debug)]
pub struct AssessArgs {
    /// Input dataset: {"schema": [...], "records": [...]}
    #[arg(short, long)]
    pub input: PathBuf,

    /// Print the report as JSON instead of the console layout
    #[arg(long)]
    pub json: bool,

    /// Override risk.k_min
    #[arg(long)]
    pub k_min: Option<usize>,
}

impl AssessArgs {
    /// Execute the assess command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(input = %self.input.display(), "Starting assess command");

        let Some(mut config) = load_or_report(config_path) else {
            return Ok(2);
        };
        if let Some(k_min) = self.k_min {
            config.risk.k_min = k_min;
            config.risk.generalize_floor = None;
        }
        if config.risk.quasi_identifiers.is_empty() {
            eprintln!("❌ risk.quasi_identifiers is empty; nothing to assess");
            return Ok(2);
        }

        let evaluator = match config.risk.evaluator() {
            Ok(evaluator) => evaluator,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(2);
            }
        };

        let dataset = read_dataset(&self.input)?;
        let report = evaluator.evaluate(&dataset.records);

        if self.json {
            println!("{}", report.format_json()?);
        } else {
            print!("{}", report.format_console());
        }

        Ok(if report.satisfies_k() { 0 } else { 1 })
    }
}
