//! Numeric perturbation with uniform or Laplace noise

use super::{FieldOperator, FieldOutcome, OperatorContext};
use crate::deidentify::technique::{Noise, PerturbParams};
use crate::domain::errors::TechniqueError;
use crate::domain::value::FieldValue;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random source for one record
///
/// With a seed the stream depends only on `(seed, index)`, so results are
/// reproducible no matter which worker handles the record.
pub fn record_rng(seed: Option<u64>, index: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(splitmix64(seed ^ splitmix64(index as u64))),
        None => StdRng::from_entropy(),
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Sample from `Laplace(0, scale)` by inverse transform
pub fn sample_laplace<R: Rng + ?Sized>(rng: &mut R, scale: f64) -> f64 {
    let u: f64 = rng.gen::<f64>() - 0.5;
    let tail = (1.0 - 2.0 * u.abs()).max(f64::MIN_POSITIVE);
    -scale * u.signum() * tail.ln()
}

impl PerturbParams {
    /// Draw one noise sample
    pub fn sample_noise<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self.noise {
            Noise::Uniform { bound } if bound == 0.0 => 0.0,
            Noise::Uniform { bound } => rng.gen_range(-bound..=bound),
            Noise::Laplace {
                epsilon,
                sensitivity,
            } => sample_laplace(rng, sensitivity / epsilon),
        }
    }

    /// Clamp to the declared domain
    pub fn clamp(&self, value: f64) -> f64 {
        let mut value = value;
        if let Some(min) = self.min {
            value = value.max(min);
        }
        if let Some(max) = self.max {
            value = value.min(max);
        }
        value
    }

    fn perturb_f64(&self, value: f64, rng: &mut StdRng) -> Result<f64, TechniqueError> {
        if !value.is_finite() {
            return Err(TechniqueError::InvalidFormat(
                "value is not a finite number".to_string(),
            ));
        }
        Ok(self.clamp(value + self.sample_noise(rng)))
    }

    fn perturb_i64(&self, value: i64, rng: &mut StdRng) -> Result<i64, TechniqueError> {
        let noisy = self.perturb_f64(value as f64, rng)?.round();
        if noisy < i64::MIN as f64 || noisy >= i64::MAX as f64 {
            return Err(TechniqueError::InvalidFormat(
                "perturbed value is outside the i64 range".to_string(),
            ));
        }
        Ok(noisy as i64)
    }
}

impl FieldOperator for PerturbParams {
    fn apply(
        &self,
        value: &FieldValue,
        ctx: &mut OperatorContext<'_>,
    ) -> Result<FieldOutcome, TechniqueError> {
        let perturbed = match value {
            FieldValue::Null => FieldValue::Null,
            FieldValue::Integer(i) => FieldValue::Integer(self.perturb_i64(*i, ctx.rng)?),
            FieldValue::Decimal(f) => FieldValue::Decimal(self.perturb_f64(*f, ctx.rng)?),
            FieldValue::Text(s) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    FieldValue::Text(self.perturb_i64(i, ctx.rng)?.to_string())
                } else if let Ok(f) = trimmed.parse::<f64>() {
                    FieldValue::Text(self.perturb_f64(f, ctx.rng)?.to_string())
                } else {
                    return Err(TechniqueError::InvalidFormat(
                        "value is not numeric".to_string(),
                    ));
                }
            }
            FieldValue::Date(_) => {
                return Err(TechniqueError::InvalidFormat(
                    "dates cannot be perturbed".to_string(),
                ))
            }
        };
        Ok(FieldOutcome::Value(perturbed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value::FieldType;
    use chrono::NaiveDate;

    fn uniform(bound: f64, min: Option<f64>, max: Option<f64>) -> PerturbParams {
        PerturbParams {
            noise: Noise::Uniform { bound },
            min,
            max,
        }
    }

    fn run(params: &PerturbParams, value: FieldValue, rng: &mut StdRng) -> FieldValue {
        let mut ctx = OperatorContext {
            field_type: FieldType::Decimal,
            reference_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            rng,
        };
        match params.apply(&value, &mut ctx).unwrap() {
            FieldOutcome::Value(v) => v,
            FieldOutcome::DropRecord => panic!("perturb never drops records"),
        }
    }

    #[test]
    fn test_uniform_noise_stays_in_bound() {
        let params = uniform(3.0, None, None);
        let mut rng = record_rng(Some(42), 0);
        for _ in 0..1000 {
            match run(&params, FieldValue::Decimal(100.0), &mut rng) {
                FieldValue::Decimal(v) => assert!((97.0..=103.0).contains(&v)),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_integer_type_is_preserved_and_clamped() {
        let params = uniform(50.0, Some(0.0), Some(120.0));
        let mut rng = record_rng(Some(7), 3);
        for _ in 0..500 {
            match run(&params, FieldValue::Integer(5), &mut rng) {
                FieldValue::Integer(v) => assert!((0..=120).contains(&v)),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_seeded_rng_is_reproducible_per_record() {
        let params = PerturbParams {
            noise: Noise::Laplace {
                epsilon: 0.5,
                sensitivity: 1.0,
            },
            min: None,
            max: None,
        };
        let a = run(&params, FieldValue::Decimal(10.0), &mut record_rng(Some(99), 4));
        let b = run(&params, FieldValue::Decimal(10.0), &mut record_rng(Some(99), 4));
        let c = run(&params, FieldValue::Decimal(10.0), &mut record_rng(Some(99), 5));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_laplace_is_centered() {
        let mut rng = record_rng(Some(1), 0);
        let n = 20_000;
        let mean: f64 = (0..n).map(|_| sample_laplace(&mut rng, 2.0)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.15, "mean {mean} too far from zero");
    }

    #[test]
    fn test_non_numeric_is_invalid_format() {
        let params = uniform(1.0, None, None);
        let mut rng = record_rng(Some(1), 0);
        let mut ctx = OperatorContext {
            field_type: FieldType::Text,
            reference_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            rng: &mut rng,
        };
        let err = params
            .apply(&FieldValue::from("abc"), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, TechniqueError::InvalidFormat(_)));
    }

    #[test]
    fn test_zero_bound_is_identity() {
        let params = uniform(0.0, None, None);
        let mut rng = record_rng(None, 0);
        assert_eq!(
            run(&params, FieldValue::Integer(41), &mut rng),
            FieldValue::Integer(41)
        );
    }
}
