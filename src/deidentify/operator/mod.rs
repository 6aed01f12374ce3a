//! Technique operators
//!
//! Mask, generalize, perturb and suppress are pure functions of one field value,
//! their parameters and an [`OperatorContext`]. Pseudonymize is the only
//! operator with I/O: it goes through the correspondence store and lives in
//! [`pseudonymize`].

pub mod generalize;
pub mod mask;
pub mod perturb;
pub mod pseudonymize;
pub mod suppress;

use crate::deidentify::technique::Technique;
use crate::domain::errors::TechniqueError;
use crate::domain::value::{FieldType, FieldValue};
use chrono::NaiveDate;
use rand::rngs::StdRng;

/// Per-record state handed to local operators
pub struct OperatorContext<'a> {
    /// Declared type of the field being transformed
    pub field_type: FieldType,

    /// "Today" for age-style date generalization
    pub reference_date: NaiveDate,

    /// Record-scoped random source for perturbation
    pub rng: &'a mut StdRng,
}

/// Result of applying one technique to one field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    /// Replacement value for the field
    Value(FieldValue),
    /// The whole record must be dropped
    DropRecord,
}

/// Trait for operators that need nothing but the value and the context
pub trait FieldOperator: Send + Sync {
    /// Transform a single field value
    fn apply(
        &self,
        value: &FieldValue,
        ctx: &mut OperatorContext<'_>,
    ) -> Result<FieldOutcome, TechniqueError>;
}

impl Technique {
    /// The local operator for this technique, `None` for pseudonymize
    pub fn local_operator(&self) -> Option<&dyn FieldOperator> {
        match self {
            Self::Mask(params) => Some(params),
            Self::Generalize(params) => Some(params),
            Self::Perturb(params) => Some(params),
            Self::Suppress(params) => Some(params),
            Self::Pseudonymize(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deidentify::technique::{GeneralizeParams, MaskParams, SuppressParams};
    use crate::domain::TechniqueId;
    use crate::deidentify::technique::PseudonymizeParams;
    use rand::SeedableRng;

    #[test]
    fn test_local_operator_dispatch() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut ctx = OperatorContext {
            field_type: FieldType::PostalCode,
            reference_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            rng: &mut rng,
        };

        let technique = Technique::Generalize(GeneralizeParams::PostalPrefix {
            prefix_len: 3,
            wildcard: '*',
        });
        let outcome = technique
            .local_operator()
            .unwrap()
            .apply(&FieldValue::from("28045"), &mut ctx)
            .unwrap();
        assert_eq!(outcome, FieldOutcome::Value(FieldValue::from("280**")));

        assert!(Technique::Mask(MaskParams::default()).local_operator().is_some());
        assert!(Technique::Suppress(SuppressParams::default())
            .local_operator()
            .is_some());
        let pseudonymize = Technique::Pseudonymize(PseudonymizeParams::new(
            TechniqueId::new("customer").unwrap(),
        ));
        assert!(pseudonymize.local_operator().is_none());
    }
}
