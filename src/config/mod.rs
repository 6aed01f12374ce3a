//! Configuration management for Veil.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Veil uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `VEIL_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation with descriptive messages
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use veil::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("veil.toml")?;
//! println!("Strict mode: {}", config.engine.strict_mode);
//! println!("Policies: {}", config.policies.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`EngineConfig`] - Strictness, default technique, workers, store timeouts
//! - [`RiskConfig`] - Quasi-identifiers and `k_min`
//! - [`StoreConfig`] - Correspondence store backend and keys
//! - `policies` - Ordered [`FieldPolicy`](crate::deidentify::FieldPolicy) list
//! - [`LoggingConfig`] - Local file logging
//!
//! # Example Configuration
//!
//! ```toml
//! [engine]
//! strict_mode = true
//! perturbation_seed = 42
//!
//! [risk]
//! enabled = true
//! quasi_identifiers = [["zip", "birthYear"]]
//! k_min = 5
//!
//! [store]
//! backend = "journal"
//! path = "./data/correspondence.jsonl"
//! encryption_key = "${VEIL_ENCRYPTION_KEY}"
//! hmac_key = "${VEIL_HMAC_KEY}"
//!
//! [[policies]]
//! matcher = { field = "email" }
//! techniques = [{ technique = "mask", keep_leading = 1 }]
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, EngineConfig, LoggingConfig, OnError, RiskConfig, StoreBackend,
    StoreConfig, VeilConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
