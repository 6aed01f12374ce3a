//! Reverse command implementation
//!
//! Looks up the original behind a reversible pseudonym. The caller identity
//! and scopes are issued outside Veil and passed in as arguments.

use super::load_or_report;
use crate::config::StoreBackend;
use crate::domain::errors::StoreError;
use crate::domain::ids::{Pseudonym, TechniqueId};
use crate::store::{CorrespondenceStore, Credential};
use clap::Args;

/// Arguments for the reverse command
#[derive(Args, Debug)]
pub struct ReverseArgs {
    /// Technique id the pseudonym was issued under
    #[arg(long)]
    pub technique_id: String,

    /// Pseudonym to reverse
    #[arg(long)]
    pub pseudonym: String,

    /// Caller identity
    #[arg(long, env = "VEIL_PRINCIPAL")]
    pub principal: String,

    /// Granted scope, repeatable (`reverse:*` or `reverse:<technique_id>`)
    #[arg(long)]
    pub scope: Vec<String>,
}

impl ReverseArgs {
    /// Execute the reverse command
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

        if config.store.backend == StoreBackend::Memory {
            eprintln!("⚠️  store.backend is 'memory'; only mappings created by this process exist");
        }

        let store = match config.store.open().await {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(error = %e, "Failed to open correspondence store");
                eprintln!("❌ Failed to open correspondence store: {e}");
                return Ok(5);
            }
        };

        let credential = Credential::new(self.principal.as_str(), self.scope.clone());
        tracing::info!(
            principal = %credential.principal,
            technique_id = %technique_id,
            "Reverse lookup requested"
        );

        match store
            .reverse(&technique_id, &Pseudonym::new(self.pseudonym.as_str()), &credential)
            .await
        {
            Ok(original) => {
                println!("{original}");
                Ok(0)
            }
            Err(e @ (StoreError::Unauthorized(_) | StoreError::NotFound(_))) => {
                tracing::warn!(
                    principal = %credential.principal,
                    technique_id = %technique_id,
                    error = %e,
                    "Reverse lookup refused"
                );
                eprintln!("❌ {e}");
                Ok(1)
            }
            Err(e) => {
                eprintln!("❌ {e}");
                Ok(5)
            }
        }
    }
}
