//! Domain models and types for Veil.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Typed values** ([`FieldValue`], [`FieldType`])
//! - **Records and datasets** ([`Record`], [`Schema`], [`Dataset`])
//! - **Strongly-typed identifiers** ([`TechniqueId`], [`Pseudonym`])
//! - **Error types** ([`VeilError`], [`TechniqueError`], [`StoreError`], [`ErrorKind`])
//! - **Result type alias** ([`Result`])
//!
//! # Example
//!
//! ```rust
//! use veil::domain::{FieldValue, Record};
//!
//! let record = Record::new()
//!     .with("id", "u1")
//!     .with("birthYear", 1985_i64);
//! assert_eq!(record.get("birthYear"), Some(&FieldValue::Integer(1985)));
//! ```

pub mod errors;
pub mod ids;
pub mod record;
pub mod result;
pub mod value;

// Re-export commonly used types for convenience
pub use errors::{ErrorKind, StoreError, TechniqueError, VeilError};
pub use ids::{Pseudonym, TechniqueId};
pub use record::{Dataset, FieldSpec, Record, Schema};
pub use result::Result;
pub use value::{FieldType, FieldValue};
