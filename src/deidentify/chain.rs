//! Ordered application of a technique list to one field

use crate::deidentify::operator::pseudonymize::{PseudonymOutcome, Pseudonymizer};
use crate::deidentify::operator::{FieldOutcome, OperatorContext};
use crate::deidentify::technique::Technique;
use crate::domain::errors::VeilError;
use crate::domain::value::FieldValue;

/// Result of running a technique chain
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome {
    /// Final value, or a record-drop signal
    pub outcome: FieldOutcome,
    /// Pseudonyms derived locally because the store was unavailable
    pub fallback_pseudonyms: usize,
}

/// Apply `techniques` in order, each to the previous output
///
/// A record-drop signal ends the chain early.
pub async fn apply_chain(
    techniques: &[Technique],
    value: &FieldValue,
    ctx: &mut OperatorContext<'_>,
    pseudonymizer: &Pseudonymizer,
) -> Result<ChainOutcome, VeilError> {
    let mut current = value.clone();
    let mut fallback_pseudonyms = 0;

    for technique in techniques {
        let step = match (technique, technique.local_operator()) {
            (_, Some(operator)) => operator.apply(&current, ctx)?,
            (Technique::Pseudonymize(params), None) => {
                let outcome = pseudonymizer.apply(params, &current).await?;
                if matches!(outcome, PseudonymOutcome::Fallback(_)) {
                    fallback_pseudonyms += 1;
                }
                FieldOutcome::Value(outcome.into_value())
            }
            (other, None) => {
                return Err(VeilError::Validation(format!(
                    "technique '{}' has no operator",
                    other.name()
                )))
            }
        };

        match step {
            FieldOutcome::Value(next) => current = next,
            FieldOutcome::DropRecord => {
                return Ok(ChainOutcome {
                    outcome: FieldOutcome::DropRecord,
                    fallback_pseudonyms,
                })
            }
        }
    }

    Ok(ChainOutcome {
        outcome: FieldOutcome::Value(current),
        fallback_pseudonyms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deidentify::operator::pseudonymize::StoreFailureAction;
    use crate::deidentify::technique::{
        GeneralizeParams, PseudonymizeParams, SuppressParams, SuppressScope,
    };
    use crate::domain::value::FieldType;
    use crate::domain::TechniqueId;
    use crate::store::{CorrespondenceTable, ValueProtector};
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;
    use std::time::Duration;

    fn pseudonymizer() -> Pseudonymizer {
        Pseudonymizer::new(
            Arc::new(CorrespondenceTable::new(ValueProtector::ephemeral().unwrap())),
            Arc::new(ValueProtector::ephemeral().unwrap()),
            Duration::from_secs(1),
            StoreFailureAction::FailRecord,
            true,
        )
    }

    #[tokio::test]
    async fn test_chain_feeds_each_output_forward() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut ctx = OperatorContext {
            field_type: FieldType::PostalCode,
            reference_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            rng: &mut rng,
        };
        let techniques = vec![
            Technique::Generalize(GeneralizeParams::PostalPrefix {
                prefix_len: 3,
                wildcard: '*',
            }),
            Technique::Pseudonymize(PseudonymizeParams::new(TechniqueId::new("zip").unwrap())),
        ];
        let p = pseudonymizer();

        let a = apply_chain(&techniques, &FieldValue::from("28045"), &mut ctx, &p)
            .await
            .unwrap();
        let b = apply_chain(&techniques, &FieldValue::from("28099"), &mut ctx, &p)
            .await
            .unwrap();
        // both generalize to "280**" before pseudonymization
        assert_eq!(a, b);
        assert_eq!(a.fallback_pseudonyms, 0);
    }

    #[tokio::test]
    async fn test_record_drop_stops_chain() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut ctx = OperatorContext {
            field_type: FieldType::Text,
            reference_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            rng: &mut rng,
        };
        let techniques = vec![
            Technique::Suppress(SuppressParams {
                scope: SuppressScope::Record,
                ..SuppressParams::default()
            }),
            Technique::Generalize(GeneralizeParams::NumericBucket { width: 5 }),
        ];
        let outcome = apply_chain(&techniques, &FieldValue::from("x"), &mut ctx, &pseudonymizer())
            .await
            .unwrap();
        assert_eq!(outcome.outcome, FieldOutcome::DropRecord);
    }

    #[tokio::test]
    async fn test_empty_chain_is_identity() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut ctx = OperatorContext {
            field_type: FieldType::Text,
            reference_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            rng: &mut rng,
        };
        let outcome = apply_chain(&[], &FieldValue::from("keep"), &mut ctx, &pseudonymizer())
            .await
            .unwrap();
        assert_eq!(outcome.outcome, FieldOutcome::Value(FieldValue::from("keep")));
    }
}
