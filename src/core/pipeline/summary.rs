//! Batch summary and reporting
//!
//! This module defines structures for tracking and reporting batch results.
//! Issues carry field names and error kinds but never field values.

use super::state::BatchState;
use crate::domain::errors::{ErrorKind, VeilError};
use crate::domain::record::Record;
use crate::risk::RiskReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// How much an issue matters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Expected outcome worth recording (suppressed records)
    Info,
    /// Recovered locally, output still produced
    Warning,
    /// Caused a record failure or a batch abort
    Error,
}

/// One problem observed while processing a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchIssue {
    /// Input position of the affected record, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_index: Option<usize>,

    /// Affected field, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// Classification
    pub kind: ErrorKind,

    /// Severity
    pub severity: IssueSeverity,

    /// Description
    pub message: String,
}

impl BatchIssue {
    /// Issue for an error
    pub fn from_error(error: &VeilError, severity: IssueSeverity) -> Self {
        Self {
            record_index: None,
            field: None,
            kind: error.kind(),
            severity,
            message: error.to_string(),
        }
    }

    /// Informational issue for a dropped record
    pub fn suppressed(record_index: usize, message: impl Into<String>) -> Self {
        Self {
            record_index: Some(record_index),
            field: None,
            kind: ErrorKind::RecordSuppressed,
            severity: IssueSeverity::Info,
            message: message.into(),
        }
    }

    /// Attach a record index
    pub fn at_record(mut self, record_index: usize) -> Self {
        self.record_index = Some(record_index);
        self
    }

    /// Attach a field name
    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// Summary of one batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Batch identifier, for correlating logs
    pub batch_id: Uuid,

    /// When processing started
    pub started_at: DateTime<Utc>,

    /// Final state
    pub state: BatchState,

    /// Records received
    pub total: usize,

    /// Records in the output
    pub transformed: usize,

    /// Records dropped by record-scope suppress techniques
    pub suppressed: usize,

    /// Records dropped on risk evaluation
    pub risk_suppressed: usize,

    /// Records that failed under a strict policy
    pub errored: usize,

    /// Records never processed because of cancellation or abort
    pub abandoned: usize,

    /// Records discarded after an abort (`on_error = discard`)
    pub discarded: usize,

    /// Fields with no technique in the plan
    pub passthrough_fields: usize,

    /// Pseudonyms derived locally during store outages
    pub fallback_pseudonyms: usize,

    /// Records recommended for further generalization
    pub generalize_further: usize,

    /// Whether a shutdown signal stopped dispatching
    pub cancelled: bool,

    /// Processing time in milliseconds
    pub duration_ms: u64,

    /// Issues in detection order
    pub issues: Vec<BatchIssue>,

    /// Risk report of the output, when risk evaluation ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_report: Option<RiskReport>,
}

impl BatchSummary {
    /// Create an empty summary for a received batch
    pub fn new(total: usize) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            started_at: Utc::now(),
            state: BatchState::Received,
            total,
            transformed: 0,
            suppressed: 0,
            risk_suppressed: 0,
            errored: 0,
            abandoned: 0,
            discarded: 0,
            passthrough_fields: 0,
            fallback_pseudonyms: 0,
            generalize_further: 0,
            cancelled: false,
            duration_ms: 0,
            issues: Vec::new(),
            risk_report: None,
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Add an issue
    pub fn add_issue(&mut self, issue: BatchIssue) {
        self.issues.push(issue);
    }

    /// Issues of one kind
    pub fn issues_of(&self, kind: ErrorKind) -> impl Iterator<Item = &BatchIssue> {
        self.issues.iter().filter(move |issue| issue.kind == kind)
    }

    /// Whether any warning or error was recorded
    pub fn has_issues(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity != IssueSeverity::Info)
    }

    /// Finalized, every record accounted for, nothing worse than info
    pub fn is_successful(&self) -> bool {
        self.state == BatchState::Finalized
            && self.abandoned == 0
            && self.errored == 0
            && !self.has_issues()
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            batch_id = %self.batch_id,
            state = %self.state,
            total = self.total,
            transformed = self.transformed,
            suppressed = self.suppressed,
            risk_suppressed = self.risk_suppressed,
            errored = self.errored,
            abandoned = self.abandoned,
            passthrough_fields = self.passthrough_fields,
            fallback_pseudonyms = self.fallback_pseudonyms,
            duration_ms = self.duration_ms,
            "Batch summary"
        );

        let problems: Vec<&BatchIssue> = self
            .issues
            .iter()
            .filter(|issue| issue.severity != IssueSeverity::Info)
            .collect();
        if !problems.is_empty() {
            tracing::warn!(
                batch_id = %self.batch_id,
                issue_count = problems.len(),
                "Batch completed with issues"
            );
            for issue in problems {
                tracing::warn!(
                    record_index = ?issue.record_index,
                    field = ?issue.field,
                    kind = ?issue.kind,
                    message = %issue.message,
                    "Batch issue"
                );
            }
        }
    }

    /// Format summary for console output
    pub fn format_console(&self) -> String {
        let mut output = String::new();

        output.push('\n');
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push_str("                      BATCH SUMMARY                            \n");
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push_str(&format!("  Batch:                {}\n", self.batch_id));
        output.push_str(&format!("  State:                {}\n", self.state));
        output.push_str(&format!("  Records Received:     {}\n", self.total));
        output.push_str(&format!("  Records Output:       {}\n", self.transformed));
        output.push_str(&format!("  Suppressed:           {}\n", self.suppressed));
        output.push_str(&format!("  Risk Suppressed:      {}\n", self.risk_suppressed));
        output.push_str(&format!("  Errored:              {}\n", self.errored));
        output.push_str(&format!("  Abandoned:            {}\n", self.abandoned));
        output.push_str(&format!("  Pass-through Fields:  {}\n", self.passthrough_fields));
        output.push_str(&format!("  Fallback Pseudonyms:  {}\n", self.fallback_pseudonyms));
        output.push_str(&format!("  Duration:             {} ms\n", self.duration_ms));

        let problems: Vec<&BatchIssue> = self
            .issues
            .iter()
            .filter(|issue| issue.severity != IssueSeverity::Info)
            .collect();
        if !problems.is_empty() {
            output.push_str("\n⚠️  ISSUES\n");
            output.push_str("───────────────────────────────────────────────────────────────\n");
            for issue in problems.iter().take(20) {
                let location = match (issue.record_index, &issue.field) {
                    (Some(index), Some(field)) => format!("record {index}, {field}"),
                    (Some(index), None) => format!("record {index}"),
                    (None, Some(field)) => field.clone(),
                    (None, None) => "batch".to_string(),
                };
                output.push_str(&format!("  • [{location}] {}\n", issue.message));
            }
            if problems.len() > 20 {
                output.push_str(&format!("  … and {} more\n", problems.len() - 20));
            }
        }

        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output
    }
}

/// Output of one batch
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Transformed records, possibly fewer than received
    pub records: Vec<Record>,

    /// Counts, issues and optional risk report
    pub summary: BatchSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::TechniqueError;

    #[test]
    fn test_batch_summary_creation() {
        let summary = BatchSummary::new(10);
        assert_eq!(summary.total, 10);
        assert_eq!(summary.state, BatchState::Received);
        assert!(summary.issues.is_empty());
        assert!(!summary.is_successful());
    }

    #[test]
    fn test_info_issues_do_not_count_as_problems() {
        let mut summary = BatchSummary::new(2);
        summary.state = BatchState::Finalized;
        summary.add_issue(BatchIssue::suppressed(1, "record-scope suppress"));
        assert!(!summary.has_issues());
        assert!(summary.is_successful());

        let err: VeilError = TechniqueError::InvalidFormat("email has no '@'".into()).into();
        summary.add_issue(
            BatchIssue::from_error(&err, IssueSeverity::Warning)
                .at_record(0)
                .on_field("email"),
        );
        assert!(summary.has_issues());
        assert!(!summary.is_successful());
        assert_eq!(summary.issues_of(ErrorKind::InvalidFormat).count(), 1);
    }

    #[test]
    fn test_summary_serializes() {
        let summary = BatchSummary::new(1).with_duration(Duration::from_millis(1500));
        assert_eq!(summary.duration_ms, 1500);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["state"], "received");
        assert!(json.get("risk_report").is_none());
    }

    #[test]
    fn test_format_console_lists_issues() {
        let mut summary = BatchSummary::new(1);
        let err = VeilError::NoPolicyForField("ssn".to_string());
        summary.add_issue(BatchIssue::from_error(&err, IssueSeverity::Error).on_field("ssn"));
        let console = summary.format_console();
        assert!(console.contains("BATCH SUMMARY"));
        assert!(console.contains("[ssn] No policy for field 'ssn'"));
    }
}
