// Veil - Field-level de-identification engine
// Copyright (c) 2025 Veil Contributors
// Licensed under the MIT License

//! # Veil - field-level de-identification
//!
//! Veil transforms datasets of records so they can leave a trusted boundary:
//! every field is matched to a policy, each policy applies a chain of
//! techniques, and an optional k-anonymity check reports (and suppresses) the
//! records that remain re-identifiable.
//!
//! ## Overview
//!
//! - **Policies** map field names, field types or name patterns to technique
//!   chains (mask, pseudonymize, generalize, suppress, perturb)
//! - **Pseudonyms** are stable per technique id and live in a correspondence
//!   store; reversible entries can be recovered by authorized credentials
//! - **Risk evaluation** groups records by quasi-identifier combinations and
//!   flags equivalence classes smaller than `k_min`
//! - **Batches** are processed by a pool of workers under a state machine that
//!   never loses track of a record
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Batch orchestration (classification, workers, finalization)
//! - [`deidentify`] - Policies, techniques and field operators
//! - [`store`] - Correspondence store and its encryption
//! - [`risk`] - Re-identification risk evaluation
//! - [`domain`] - Records, values, identifiers and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use veil::config::load_config;
//! use veil::core::pipeline::BatchOrchestrator;
//! use veil::domain::Dataset;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("veil.toml")?;
//!     let orchestrator = BatchOrchestrator::from_config(&config).await?;
//!
//!     let dataset = Dataset::from_json_str(&std::fs::read_to_string("dataset.json")?)?;
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!     let outcome = orchestrator.process(dataset, shutdown_rx).await;
//!
//!     println!("Transformed {} of {}", outcome.summary.transformed, outcome.summary.total);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library functions return [`domain::Result`], whose error type
//! [`domain::VeilError`] carries an [`domain::ErrorKind`] for programmatic
//! matching. Batch processing itself never fails: per-record and per-field
//! problems are reported in the batch summary.
//!
//! ## Logging
//!
//! Veil logs with `tracing`. Field values never appear in log events; where a
//! value must be correlated, [`logging::fingerprint`] gives a truncated digest.

pub mod cli;
pub mod config;
pub mod core;
pub mod deidentify;
pub mod domain;
pub mod logging;
pub mod risk;
pub mod store;
