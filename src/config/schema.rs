//! Configuration schema types
//!
//! This module defines the configuration structure for Veil. Every section has
//! defaults, so an empty file is a valid (strict, policy-less) configuration.

use crate::config::SecretString;
use crate::deidentify::operator::pseudonymize::StoreFailureAction;
use crate::deidentify::policy::{validate_policies, FieldPolicy};
use crate::deidentify::technique::Technique;
use crate::domain::errors::StoreError;
use crate::risk::{default_generalize_floor, RiskEvaluator};
use crate::store::{CorrespondenceTable, ValueProtector};
use chrono::NaiveDate;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main Veil configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VeilConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Transformation engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Re-identification risk settings
    #[serde(default)]
    pub risk: RiskConfig,

    /// Correspondence store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Field policies
    #[serde(default)]
    pub policies: Vec<FieldPolicy>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl VeilConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.engine.validate()?;
        self.risk.validate()?;
        self.store.validate()?;
        validate_policies(&self.policies).map_err(|e| e.to_string())?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// What happens to partial results when a strict failure aborts a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Drop every record, return only the summary
    #[default]
    Discard,
    /// Return the records finished before the abort alongside the issues
    ReturnPartial,
}

/// Transformation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Unmatched fields and field failures abort the batch
    #[serde(default = "default_true")]
    pub strict_mode: bool,

    /// Techniques for fields no policy matches; absent means none
    #[serde(default)]
    pub default_technique: Option<Vec<Technique>>,

    /// Seed making perturbation reproducible; random when absent
    #[serde(default)]
    pub perturbation_seed: Option<u64>,

    /// Mapping mode for pseudonymize techniques that don't set `reversible`
    #[serde(default)]
    pub reversible_by_default: bool,

    /// Worker tasks per batch
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Keep output records in input order
    #[serde(default = "default_true")]
    pub stable_ordering: bool,

    /// Upper bound on each correspondence store call
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Reaction to store timeouts and outages
    #[serde(default)]
    pub store_failure: StoreFailureAction,

    /// Partial result handling for aborted batches
    #[serde(default)]
    pub on_error: OnError,

    /// Reference date for age-style date generalization; today when absent
    #[serde(default)]
    pub reference_date: Option<NaiveDate>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_mode: true,
            default_technique: None,
            perturbation_seed: None,
            reversible_by_default: false,
            workers: default_workers(),
            stable_ordering: true,
            store_timeout_ms: default_store_timeout_ms(),
            store_failure: StoreFailureAction::default(),
            on_error: OnError::default(),
            reference_date: None,
        }
    }
}

impl EngineConfig {
    fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("engine.workers must be > 0".to_string());
        }
        if self.workers > 256 {
            return Err("engine.workers must be <= 256".to_string());
        }
        if self.store_timeout_ms == 0 {
            return Err("engine.store_timeout_ms must be > 0".to_string());
        }
        if let Some(defaults) = &self.default_technique {
            for technique in defaults {
                technique
                    .validate()
                    .map_err(|e| format!("engine.default_technique: {e}"))?;
            }
        }
        Ok(())
    }

    /// Store call timeout
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Reference date, defaulting to today (UTC)
    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}

/// Re-identification risk configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Evaluate transformed batches
    #[serde(default)]
    pub enabled: bool,

    /// Quasi-identifier combinations, each evaluated independently
    #[serde(default)]
    pub quasi_identifiers: Vec<Vec<String>>,

    /// Minimum acceptable equivalence class size
    #[serde(default = "default_k_min")]
    pub k_min: usize,

    /// Drop records recommended for suppression
    #[serde(default = "default_true")]
    pub apply_suppression: bool,

    /// Smallest class size answered with `generalize_further`
    #[serde(default)]
    pub generalize_floor: Option<usize>,

    /// Flag fields holding dataset-unique values
    #[serde(default = "default_true")]
    pub outlier_detection: bool,

    /// Fields never flagged as outliers (ids, pseudonyms)
    #[serde(default)]
    pub outlier_ignore: Vec<String>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            quasi_identifiers: Vec::new(),
            k_min: default_k_min(),
            apply_suppression: true,
            generalize_floor: None,
            outlier_detection: true,
            outlier_ignore: Vec::new(),
        }
    }
}

impl RiskConfig {
    fn validate(&self) -> Result<(), String> {
        if self.k_min == 0 {
            return Err("risk.k_min must be > 0".to_string());
        }
        if let Some(position) = self.quasi_identifiers.iter().position(Vec::is_empty) {
            return Err(format!("risk.quasi_identifiers[{position}] is empty"));
        }
        if let Some(floor) = self.generalize_floor {
            if floor == 0 || floor > self.k_min {
                return Err(format!(
                    "risk.generalize_floor must be between 1 and k_min ({}), got {floor}",
                    self.k_min
                ));
            }
        }
        if self.enabled && self.quasi_identifiers.is_empty() {
            return Err("risk.enabled requires at least one quasi_identifiers entry".to_string());
        }
        Ok(())
    }

    /// Effective generalization floor
    pub fn generalize_floor(&self) -> usize {
        self.generalize_floor
            .unwrap_or_else(|| default_generalize_floor(self.k_min))
    }

    /// Build the evaluator described by this section
    pub fn evaluator(&self) -> crate::domain::Result<RiskEvaluator> {
        Ok(
            RiskEvaluator::new(self.quasi_identifiers.clone(), self.k_min)?
                .with_generalize_floor(self.generalize_floor())
                .with_outliers(self.outlier_detection, self.outlier_ignore.clone()),
        )
    }
}

/// Correspondence store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-lifetime table
    #[default]
    Memory,
    /// Table persisted to a JSON-lines journal
    Journal,
}

/// Correspondence store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend selection
    #[serde(default)]
    pub backend: StoreBackend,

    /// Journal file for the `journal` backend
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Base64 AES-256 key (32 bytes)
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub encryption_key: Option<SecretString>,

    /// Base64 HMAC-SHA256 key (at least 16 bytes)
    #[serde(default)]
    pub hmac_key: Option<SecretString>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: default_store_path(),
            encryption_key: None,
            hmac_key: None,
        }
    }
}

impl StoreConfig {
    fn validate(&self) -> Result<(), String> {
        match (&self.encryption_key, &self.hmac_key) {
            (Some(_), Some(_)) => {
                self.protector().map_err(|e| format!("store keys: {e}"))?;
            }
            (None, None) if self.backend == StoreBackend::Journal => {
                return Err(
                    "store.backend = 'journal' requires store.encryption_key and store.hmac_key"
                        .to_string(),
                );
            }
            (None, None) => {}
            _ => {
                return Err(
                    "store.encryption_key and store.hmac_key must be set together".to_string(),
                );
            }
        }
        if self.backend == StoreBackend::Journal && self.path.as_os_str().is_empty() {
            return Err("store.path cannot be empty".to_string());
        }
        Ok(())
    }

    /// Key holder from the configured keys, or fresh random keys when none are set
    pub fn protector(&self) -> Result<ValueProtector, StoreError> {
        match (&self.encryption_key, &self.hmac_key) {
            (Some(encryption_key), Some(hmac_key)) => ValueProtector::from_base64(
                encryption_key.expose_secret().as_ref(),
                hmac_key.expose_secret().as_ref(),
            ),
            _ => ValueProtector::ephemeral(),
        }
    }

    /// Open the configured backend
    pub async fn open(&self) -> Result<CorrespondenceTable, StoreError> {
        let protector = self.protector()?;
        match self.backend {
            StoreBackend::Memory => Ok(CorrespondenceTable::new(protector)),
            StoreBackend::Journal => {
                CorrespondenceTable::open_journaled(protector, &self.path).await
            }
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,

    /// Maximum log file size in MB
    #[serde(default = "default_local_max_size_mb")]
    pub local_max_size_mb: usize,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_max_size_mb == 0 {
            return Err("logging.local_max_size_mb must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
            local_max_size_mb: default_local_max_size_mb(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    4
}

fn default_store_timeout_ms() -> u64 {
    2_000
}

fn default_k_min() -> usize {
    5
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data/correspondence.jsonl")
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

fn default_local_max_size_mb() -> usize {
    100
}
