//! Per-batch transformation plan
//!
//! The resolver is consulted once per field name, not once per record.

use super::summary::{BatchIssue, IssueSeverity};
use crate::deidentify::policy::{PolicyResolver, ResolvedPolicy};
use crate::domain::errors::VeilError;
use crate::domain::record::{Record, Schema};
use crate::domain::value::FieldType;
use crate::log_passthrough;
use std::collections::HashMap;

/// Resolved techniques for one field
#[derive(Debug, Clone)]
pub struct FieldPlan {
    /// Field name
    pub name: String,
    /// Declared type, `text` for fields outside the schema
    pub field_type: FieldType,
    /// Resolution result
    pub policy: ResolvedPolicy,
}

/// Resolved techniques for every field of a batch
#[derive(Debug, Clone, Default)]
pub struct TransformPlan {
    fields: Vec<FieldPlan>,
    by_name: HashMap<String, usize>,
}

impl TransformPlan {
    /// Resolve every schema field, then every undeclared field seen in the records
    ///
    /// # Errors
    ///
    /// One issue per field that strict mode cannot resolve.
    pub fn classify(
        schema: &Schema,
        records: &[Record],
        resolver: &PolicyResolver,
    ) -> Result<Self, Vec<BatchIssue>> {
        let mut plan = Self::default();
        let mut failures = Vec::new();

        let declared = schema
            .fields()
            .iter()
            .map(|spec| (spec.name.as_str(), spec.field_type));
        let undeclared = records
            .iter()
            .flat_map(Record::iter)
            .map(|(name, _)| name)
            .filter(|name| !schema.contains(name))
            .map(|name| (name, FieldType::Text));

        for (name, field_type) in declared.chain(undeclared) {
            if plan.by_name.contains_key(name) {
                continue;
            }
            match resolver.resolve(name, field_type) {
                Ok(policy) => plan.push(FieldPlan {
                    name: name.to_string(),
                    field_type,
                    policy,
                }),
                Err(err) => {
                    failures.push(BatchIssue::from_error(&err, IssueSeverity::Error).on_field(name));
                    // remember the name so it is reported once
                    plan.by_name.insert(name.to_string(), usize::MAX);
                }
            }
        }

        if failures.is_empty() {
            Ok(plan)
        } else {
            Err(failures)
        }
    }

    fn push(&mut self, field: FieldPlan) {
        if field.policy.is_pass_through() {
            log_passthrough!(field.name.as_str(), "no policy matched");
        }
        self.by_name.insert(field.name.clone(), self.fields.len());
        self.fields.push(field);
    }

    /// Plan for a field
    pub fn field(&self, name: &str) -> Option<&FieldPlan> {
        self.by_name
            .get(name)
            .and_then(|&index| self.fields.get(index))
    }

    /// Plan for a field, or an internal error for names the plan never saw
    pub fn require(&self, name: &str) -> Result<&FieldPlan, VeilError> {
        self.field(name).ok_or_else(|| {
            VeilError::Validation(format!("field '{name}' was not classified"))
        })
    }

    /// Planned fields in classification order
    pub fn fields(&self) -> &[FieldPlan] {
        &self.fields
    }

    /// Number of fields passed through unchanged
    pub fn passthrough_count(&self) -> usize {
        self.fields
            .iter()
            .filter(|field| field.policy.is_pass_through())
            .count()
    }
}
