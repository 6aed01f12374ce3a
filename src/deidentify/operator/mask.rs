//! Format-preserving masking

use super::{FieldOperator, FieldOutcome, OperatorContext};
use crate::deidentify::technique::{MaskFormat, MaskParams};
use crate::domain::errors::TechniqueError;
use crate::domain::value::{FieldType, FieldValue};

impl MaskParams {
    /// Masking rule for a field, explicit format first, then the declared type
    pub fn effective_format(&self, field_type: FieldType) -> MaskFormat {
        if let Some(format) = self.format {
            return format;
        }
        match field_type {
            FieldType::Email => MaskFormat::Email,
            FieldType::Phone
            | FieldType::CardNumber
            | FieldType::Identifier
            | FieldType::Integer => MaskFormat::Digits,
            _ => MaskFormat::Characters,
        }
    }

    /// Mask a text value
    ///
    /// # Examples
    ///
    /// ```
    /// use veil::deidentify::technique::{MaskFormat, MaskParams};
    ///
    /// let params = MaskParams::default();
    /// assert_eq!(
    ///     params.mask_text("jane.doe@corp.com", MaskFormat::Email).unwrap(),
    ///     "j****@corp.com"
    /// );
    /// ```
    pub fn mask_text(&self, value: &str, format: MaskFormat) -> Result<String, TechniqueError> {
        match format {
            MaskFormat::Email => self.mask_email(value),
            MaskFormat::Digits => self.mask_digits(value),
            MaskFormat::Characters => self.mask_characters(value),
        }
    }

    fn mask_email(&self, value: &str) -> Result<String, TechniqueError> {
        let (local, domain) = value
            .rsplit_once('@')
            .ok_or_else(|| TechniqueError::InvalidFormat("email has no '@'".to_string()))?;
        if local.is_empty() {
            return Err(TechniqueError::InvalidFormat(
                "email has an empty local part".to_string(),
            ));
        }
        if domain.is_empty() {
            return Err(TechniqueError::InvalidFormat(
                "email has an empty domain".to_string(),
            ));
        }
        let local_len = local.chars().count();
        if local_len <= self.keep_leading {
            return Err(TechniqueError::InvalidFormat(format!(
                "{local_len}-character local part leaves nothing to mask"
            )));
        }

        let mut masked: String = local.chars().take(self.keep_leading).collect();
        masked.extend(std::iter::repeat(self.mask_char).take(self.token_len));
        masked.push('@');
        masked.push_str(domain);
        Ok(masked)
    }

    fn mask_digits(&self, value: &str) -> Result<String, TechniqueError> {
        let digits = value.chars().filter(char::is_ascii_digit).count();
        if digits == 0 {
            return Err(TechniqueError::InvalidFormat(
                "value contains no digits".to_string(),
            ));
        }
        if digits <= self.keep_leading + self.keep_trailing {
            return Err(TechniqueError::InvalidFormat(format!(
                "{digits} digits leave nothing to mask"
            )));
        }

        let visible_tail = digits - self.keep_trailing;
        let mut seen = 0;
        let masked = value
            .chars()
            .map(|c| {
                if !c.is_ascii_digit() {
                    return c;
                }
                let position = seen;
                seen += 1;
                if position < self.keep_leading || position >= visible_tail {
                    c
                } else {
                    self.mask_char
                }
            })
            .collect();
        Ok(masked)
    }

    fn mask_characters(&self, value: &str) -> Result<String, TechniqueError> {
        let length = value.chars().count();
        if length == 0 {
            return Err(TechniqueError::InvalidFormat("value is empty".to_string()));
        }
        if length <= self.keep_leading + self.keep_trailing {
            return Err(TechniqueError::InvalidFormat(format!(
                "{length} characters leave nothing to mask"
            )));
        }

        let visible_tail = length - self.keep_trailing;
        let masked = value
            .chars()
            .enumerate()
            .map(|(i, c)| {
                if i < self.keep_leading || i >= visible_tail {
                    c
                } else {
                    self.mask_char
                }
            })
            .collect();
        Ok(masked)
    }
}

impl FieldOperator for MaskParams {
    fn apply(
        &self,
        value: &FieldValue,
        ctx: &mut OperatorContext<'_>,
    ) -> Result<FieldOutcome, TechniqueError> {
        let Some(text) = value.as_text() else {
            return Ok(FieldOutcome::Value(FieldValue::Null));
        };
        let format = self.effective_format(ctx.field_type);
        let masked = self.mask_text(&text, format)?;
        Ok(FieldOutcome::Value(FieldValue::Text(masked)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use test_case::test_case;

    fn params(keep_leading: usize, keep_trailing: usize) -> MaskParams {
        MaskParams {
            keep_leading,
            keep_trailing,
            ..MaskParams::default()
        }
    }

    #[test_case("jane.doe@corp.com", 1, "j****@corp.com" ; "standard email")]
    #[test_case("ab@b.io", 1, "a****@b.io" ; "two char local part")]
    #[test_case("jane.doe@corp.com", 0, "****@corp.com" ; "nothing kept")]
    #[test_case("jo.x@x.org", 2, "jo****@x.org" ; "keep shorter than local part")]
    fn test_mask_email(input: &str, keep_leading: usize, expected: &str) {
        let masked = params(keep_leading, 0)
            .mask_text(input, MaskFormat::Email)
            .unwrap();
        assert_eq!(masked, expected);
    }

    #[test_case("4111-1111-1111-1234", 0, 4, "****-****-****-1234" ; "card keeps last four")]
    #[test_case("+34 600 123 456", 2, 2, "+34 *** *** *56" ; "phone keeps separators")]
    #[test_case("123456", 1, 1, "1****6" ; "plain digits")]
    fn test_mask_digits(input: &str, lead: usize, trail: usize, expected: &str) {
        let masked = params(lead, trail)
            .mask_text(input, MaskFormat::Digits)
            .unwrap();
        assert_eq!(masked, expected);
    }

    #[test_case("no-at-sign.com", MaskFormat::Email ; "email without at")]
    #[test_case("@corp.com", MaskFormat::Email ; "email empty local part")]
    #[test_case("user@", MaskFormat::Email ; "email empty domain")]
    #[test_case("abc-def", MaskFormat::Digits ; "no digits")]
    #[test_case("a@b.io", MaskFormat::Email ; "local part no longer than kept prefix")]
    #[test_case("12", MaskFormat::Digits ; "too few digits")]
    #[test_case("", MaskFormat::Characters ; "empty text")]
    fn test_mask_invalid_format(input: &str, format: MaskFormat) {
        let err = params(1, 1).mask_text(input, format).unwrap_err();
        assert!(matches!(err, TechniqueError::InvalidFormat(_)));
    }

    #[test]
    fn test_mask_characters() {
        assert_eq!(
            params(1, 1)
                .mask_text("Jane", MaskFormat::Characters)
                .unwrap(),
            "J**e"
        );
    }

    #[test]
    fn test_mask_is_deterministic() {
        let p = MaskParams::default();
        let a = p.mask_text("jane.doe@corp.com", MaskFormat::Email).unwrap();
        let b = p.mask_text("jane.doe@corp.com", MaskFormat::Email).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_apply_uses_declared_type() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = OperatorContext {
            field_type: FieldType::Email,
            reference_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            rng: &mut rng,
        };
        let outcome = MaskParams::default()
            .apply(&FieldValue::from("jane.doe@corp.com"), &mut ctx)
            .unwrap();
        assert_eq!(outcome, FieldOutcome::Value(FieldValue::from("j****@corp.com")));

        let outcome = MaskParams::default()
            .apply(&FieldValue::Null, &mut ctx)
            .unwrap();
        assert_eq!(outcome, FieldOutcome::Value(FieldValue::Null));
    }

    #[test]
    fn test_explicit_format_overrides_type() {
        let p = MaskParams {
            format: Some(MaskFormat::Characters),
            ..MaskParams::default()
        };
        assert_eq!(p.effective_format(FieldType::Email), MaskFormat::Characters);
        assert_eq!(
            MaskParams::default().effective_format(FieldType::CardNumber),
            MaskFormat::Digits
        );
    }
}
