//! Transform command implementation
//!
//! Reads a dataset file, runs it through the batch orchestrator and writes the
//! transformed records as a JSON array.

use super::{load_or_report, read_dataset};
use crate::core::pipeline::{BatchOrchestrator, BatchState, BatchSummary};
use crate::domain::errors::ErrorKind;
use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use tokio::sync::watch;

/// Arguments for the transform command
#[derive(Args, Debug)]
pub struct TransformArgs {
    /// Input dataset: {"schema": [...], "records": [...]}
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file for the transformed records (stdout when absent)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write the batch summary, risk report included, as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Pass unmatched fields through instead of failing the batch
    #[arg(long)]
    pub lenient: bool,

    /// Override the perturbation seed
    #[arg(long)]
    pub seed: Option<u64>,
}

impl TransformArgs {
    /// Execute the transform command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!(input = %self.input.display(), "Starting transform command");

        let Some(mut config) = load_or_report(config_path) else {
            return Ok(2);
        };

        if self.lenient {
            tracing::info!("Disabling strict mode from CLI");
            config.engine.strict_mode = false;
        }
        if let Some(seed) = self.seed {
            tracing::info!(seed, "Overriding perturbation seed from CLI");
            config.engine.perturbation_seed = Some(seed);
        }

        let orchestrator = match BatchOrchestrator::from_config(&config).await {
            Ok(orchestrator) => orchestrator,
            Err(e) if e.kind() == ErrorKind::Configuration => {
                eprintln!("❌ Configuration error: {e}");
                return Ok(2);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to open correspondence store");
                eprintln!("❌ Failed to open correspondence store: {e}");
                return Ok(5);
            }
        };

        let dataset = read_dataset(&self.input)?;
        let outcome = orchestrator.process(dataset, shutdown_signal).await;

        let rendered = serde_json::to_string_pretty(&outcome.records)
            .context("Failed to serialize transformed records")?;
        match &self.output {
            Some(path) => std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?,
            None => println!("{rendered}"),
        }

        if let Some(path) = &self.report {
            let report = serde_json::to_string_pretty(&outcome.summary)
                .context("Failed to serialize batch summary")?;
            std::fs::write(path, report)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        eprint!("{}", outcome.summary.format_console());
        if let Some(report) = &outcome.summary.risk_report {
            eprint!("{}", report.format_console());
        }

        Ok(exit_code(&outcome.summary))
    }
}

/// Exit code for a finished batch
fn exit_code(summary: &BatchSummary) -> i32 {
    if summary.cancelled {
        eprintln!("⚠️  Transform interrupted; {} records abandoned", summary.abandoned);
        130
    } else if summary.state == BatchState::Errored {
        eprintln!("❌ Batch aborted");
        1
    } else if summary.is_successful() {
        eprintln!("✅ Transform completed successfully!");
        0
    } else {
        eprintln!("⚠️  Transform completed with issues");
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let mut summary = BatchSummary::new(3);
        summary.state = BatchState::Finalized;
        assert_eq!(exit_code(&summary), 0);

        summary.cancelled = true;
        summary.abandoned = 2;
        assert_eq!(exit_code(&summary), 130);

        summary.cancelled = false;
        summary.state = BatchState::Errored;
        assert_eq!(exit_code(&summary), 1);
    }
}
