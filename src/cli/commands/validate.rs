//! Validate config command implementation
//!
//! Loads the configuration, compiles the policy set and prints a summary.

use crate::config::{load_config, StoreBackend};
use crate::deidentify::PolicyResolver;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        if let Err(e) = PolicyResolver::new(
            config.policies.clone(),
            config.engine.default_technique.clone(),
            config.engine.strict_mode,
        ) {
            println!("❌ Policy set rejected");
            println!("   Error: {e}");
            return Ok(2);
        }

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Strict Mode: {}", config.engine.strict_mode);
        println!(
            "  Default Technique: {}",
            match &config.engine.default_technique {
                Some(techniques) => techniques
                    .iter()
                    .map(|t| t.name())
                    .collect::<Vec<_>>()
                    .join(" -> "),
                None => "none".to_string(),
            }
        );
        println!("  Policies: {}", config.policies.len());
        println!("  Workers: {}", config.engine.workers);
        println!("  Store Timeout: {} ms", config.engine.store_timeout_ms);
        println!(
            "  Store Backend: {}",
            match config.store.backend {
                StoreBackend::Memory => "memory".to_string(),
                StoreBackend::Journal => format!("journal ({})", config.store.path.display()),
            }
        );
        println!("  Store Keys: {}", config.store.encryption_key.is_some());
        if config.risk.enabled {
            println!(
                "  Risk: k_min {}, {} quasi-identifier combinations",
                config.risk.k_min,
                config.risk.quasi_identifiers.len()
            );
        } else {
            println!("  Risk: disabled");
        }
        println!();
        Ok(0)
    }
}
