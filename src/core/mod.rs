//! Core batch processing for Veil.
//!
//! # Modules
//!
//! - [`pipeline`] - Batch orchestration, transformation plans and summaries
//!
//! # Batch Workflow
//!
//! 1. **Receive**: Take a dataset (schema plus records)
//! 2. **Classify**: Resolve one technique chain per field name
//! 3. **Transform**: Workers pull records and apply the chains
//! 4. **Assess** (optional): Evaluate k-anonymity of the output
//! 5. **Finalize**: Return the records with a summary
//!
//! A strict failure at any step moves the batch to `errored` instead.

pub mod pipeline;
