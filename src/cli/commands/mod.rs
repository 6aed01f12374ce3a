//! CLI command implementations
//!
//! Every command returns a process exit code: 0 success, 1 completed with
//! issues, 2 configuration error, 5 fatal error, 130 interrupted.

pub mod assess;
pub mod init;
pub mod purge;
pub mod reverse;
pub mod transform;
pub mod validate;

use crate::config::{load_config, VeilConfig};
use crate::domain::Dataset;
use anyhow::Context;
use std::path::Path;

/// Load the configuration, printing the error for the user on failure
pub(crate) fn load_or_report(config_path: &str) -> Option<VeilConfig> {
    match load_config(config_path) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            eprintln!("❌ {e}");
            None
        }
    }
}

/// Read a dataset file
pub(crate) fn read_dataset(path: &Path) -> anyhow::Result<Dataset> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input {}", path.display()))?;
    Dataset::from_json_str(&contents)
        .with_context(|| format!("Invalid dataset {}", path.display()))
}
