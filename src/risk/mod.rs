//! Re-identification risk evaluation
//!
//! The evaluator groups records into equivalence classes over declared
//! quasi-identifier combinations and scores each record by `1 / class size`.
//! It never modifies records; the pipeline decides what to do with the
//! recommendations.

pub mod evaluator;
pub mod report;

pub use evaluator::{default_generalize_floor, RiskEvaluator};
pub use report::{ClassDistribution, Recommendation, RecordRisk, RiskReport};
