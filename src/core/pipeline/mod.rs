//! Batch pipeline
//!
//! A batch moves through `Received -> Classified -> Transformed ->
//! RiskAssessed -> Finalized`, or ends in `Errored` when a strict failure
//! aborts it. See [`BatchOrchestrator`].

pub mod orchestrator;
pub mod plan;
pub mod state;
pub mod summary;

pub use orchestrator::BatchOrchestrator;
pub use plan::{FieldPlan, TransformPlan};
pub use state::BatchState;
pub use summary::{BatchIssue, BatchOutcome, BatchSummary, IssueSeverity};
