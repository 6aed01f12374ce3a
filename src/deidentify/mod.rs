//! De-identification techniques and policies
//!
//! This module provides:
//! - [`technique`]: the tagged [`Technique`] enum and its typed parameters
//! - [`operator`]: mask, generalize, perturb, suppress and the store-backed
//!   pseudonymizer
//! - [`policy`]: field policies and the [`PolicyResolver`]
//! - [`chain`]: ordered application of a technique list to one value
//!
//! # Examples
//!
//! ```
//! use veil::deidentify::technique::{GeneralizeParams, Technique};
//! use veil::deidentify::operator::{FieldOutcome, OperatorContext};
//! use veil::domain::{FieldType, FieldValue};
//! use rand::SeedableRng;
//!
//! let technique = Technique::Generalize(GeneralizeParams::NumericBucket { width: 5 });
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let mut ctx = OperatorContext {
//!     field_type: FieldType::Integer,
//!     reference_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!     rng: &mut rng,
//! };
//! let outcome = technique
//!     .local_operator()
//!     .unwrap()
//!     .apply(&FieldValue::Integer(1985), &mut ctx)
//!     .unwrap();
//! assert_eq!(outcome, FieldOutcome::Value(FieldValue::from("[1985-1989]")));
//! ```

pub mod chain;
pub mod operator;
pub mod policy;
pub mod technique;

pub use chain::{apply_chain, ChainOutcome};
pub use operator::pseudonymize::{Pseudonymizer, StoreFailureAction};
pub use operator::{FieldOperator, FieldOutcome, OperatorContext};
pub use policy::{FieldMatcher, FieldPolicy, PolicyResolver, ResolvedPolicy, Strictness};
pub use technique::Technique;
