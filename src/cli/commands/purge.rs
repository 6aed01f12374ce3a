//! Purge command implementation
//!
//! Deletes every correspondence entry of one technique id. Existing pseudonyms
//! of that id become irreversible and a later run issues new ones.

use super::load_or_report;
use crate::domain::ids::TechniqueId;
use crate::store::CorrespondenceStore;
use clap::Args;

/// Arguments for the purge command
#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Technique id whose mappings are deleted
    #[arg(long)]
    pub technique_id: String,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl PurgeArgs {
    /// Execute the purge command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let Some(config) = load_or_report(config_path) else {
            return Ok(2);
        };

        let technique_id = match TechniqueId::new(self.technique_id.as_str()) {
            Ok(id) => id,
            Err(e) => {
                eprintln!("❌ Invalid technique id: {e}");
                return Ok(2);
            }
        };

        if !self.yes {
            print!(
                "Delete every mapping of technique '{technique_id}' from {}? [y/N]: ",
                config.store.path.display()
            );
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Purge cancelled.");
                return Ok(0);
            }
        }

        let store = match config.store.open().await {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(error = %e, "Failed to open correspondence store");
                eprintln!("❌ Failed to open correspondence store: {e}");
                return Ok(5);
            }
        };

        match store.purge(&technique_id).await {
            Ok(removed) => {
                println!("✅ Removed {removed} mappings for '{technique_id}'");
                Ok(0)
            }
            Err(e) => {
                tracing::error!(technique_id = %technique_id, error = %e, "Purge failed");
                eprintln!("❌ Purge failed: {e}");
                Ok(5)
            }
        }
    }
}
