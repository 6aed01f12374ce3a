//! Field and record suppression

use super::{FieldOperator, FieldOutcome, OperatorContext};
use crate::deidentify::technique::{SuppressParams, SuppressScope};
use crate::domain::errors::TechniqueError;
use crate::domain::value::FieldValue;

impl FieldOperator for SuppressParams {
    fn apply(
        &self,
        _value: &FieldValue,
        _ctx: &mut OperatorContext<'_>,
    ) -> Result<FieldOutcome, TechniqueError> {
        Ok(match self.scope {
            SuppressScope::Field => FieldOutcome::Value(FieldValue::Text(self.sentinel.clone())),
            SuppressScope::Record => FieldOutcome::DropRecord,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deidentify::technique::DEFAULT_SENTINEL;
    use crate::domain::value::FieldType;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_field_suppression_is_total() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut ctx = OperatorContext {
            field_type: FieldType::Text,
            reference_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            rng: &mut rng,
        };
        let params = SuppressParams::default();
        for value in [
            FieldValue::Null,
            FieldValue::from("secret"),
            FieldValue::Integer(3),
            FieldValue::Decimal(2.5),
        ] {
            assert_eq!(
                params.apply(&value, &mut ctx).unwrap(),
                FieldOutcome::Value(FieldValue::from(DEFAULT_SENTINEL))
            );
        }
    }

    #[test]
    fn test_record_scope_drops() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut ctx = OperatorContext {
            field_type: FieldType::Text,
            reference_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            rng: &mut rng,
        };
        let params = SuppressParams {
            scope: SuppressScope::Record,
            sentinel: DEFAULT_SENTINEL.to_string(),
        };
        assert_eq!(
            params.apply(&FieldValue::from("x"), &mut ctx).unwrap(),
            FieldOutcome::DropRecord
        );
    }
}
