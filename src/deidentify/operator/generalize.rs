//! Generalization: numeric buckets, postal prefixes and date buckets

use super::{FieldOperator, FieldOutcome, OperatorContext};
use crate::deidentify::technique::{DateMode, DateUnit, GeneralizeParams};
use crate::domain::errors::TechniqueError;
use crate::domain::value::FieldValue;
use chrono::{Datelike, NaiveDate};
use std::fmt;

/// Closed integer interval `[lower, upper]` produced by numeric generalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bucket {
    /// Inclusive lower bound, a multiple of the width
    pub lower: i64,
    /// Inclusive upper bound, `lower + width - 1`
    pub upper: i64,
}

impl Bucket {
    /// Whether `value` lies in the bucket
    pub fn contains(&self, value: i64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{}]", self.lower, self.upper)
    }
}

/// Bucket of width `width` containing `value`
///
/// Uses floor division so negative values land in the bucket below zero.
///
/// # Examples
///
/// ```
/// use veil::deidentify::operator::generalize::bucket;
///
/// assert_eq!(bucket(1985, 5).unwrap().to_string(), "[1985-1989]");
/// assert_eq!(bucket(-3, 5).unwrap().to_string(), "[-5--1]");
/// ```
pub fn bucket(value: i64, width: i64) -> Result<Bucket, TechniqueError> {
    if width <= 0 {
        return Err(TechniqueError::InvalidParameters(format!(
            "bucket width must be > 0, got {width}"
        )));
    }
    let lower = value
        .div_euclid(width)
        .checked_mul(width)
        .ok_or_else(|| TechniqueError::InvalidFormat("bucket bounds overflow i64".to_string()))?;
    let upper = lower
        .checked_add(width - 1)
        .ok_or_else(|| TechniqueError::InvalidFormat("bucket bounds overflow i64".to_string()))?;
    Ok(Bucket { lower, upper })
}

/// Keep `prefix_len` characters and replace the rest with `wildcard`
///
/// Values no longer than the prefix are rejected, since nothing would be hidden.
pub fn postal_prefix(value: &str, prefix_len: usize, wildcard: char) -> Result<String, TechniqueError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TechniqueError::InvalidFormat("postal code is empty".to_string()));
    }
    let length = value.chars().count();
    if length <= prefix_len {
        return Err(TechniqueError::InvalidFormat(format!(
            "{length}-character postal code is no longer than the {prefix_len}-character prefix"
        )));
    }
    Ok(value
        .chars()
        .enumerate()
        .map(|(i, c)| if i < prefix_len { c } else { wildcard })
        .collect())
}

/// Integer position of a date for bucketing
pub fn date_ordinal(date: NaiveDate, unit: DateUnit, mode: DateMode, reference: NaiveDate) -> i64 {
    match (mode, unit) {
        (DateMode::Calendar, DateUnit::Years) => i64::from(date.year()),
        (DateMode::Calendar, DateUnit::Months) => month_index(date),
        (DateMode::Calendar, DateUnit::Days) => i64::from(date.num_days_from_ce()),
        (DateMode::Age, DateUnit::Years) => {
            let mut years = i64::from(reference.year() - date.year());
            if (reference.month(), reference.day()) < (date.month(), date.day()) {
                years -= 1;
            }
            years
        }
        (DateMode::Age, DateUnit::Months) => {
            let mut months = month_index(reference) - month_index(date);
            if reference.day() < date.day() {
                months -= 1;
            }
            months
        }
        (DateMode::Age, DateUnit::Days) => (reference - date).num_days(),
    }
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

fn numeric_input(value: &FieldValue) -> Result<i64, TechniqueError> {
    let as_integer = |f: f64| -> Result<i64, TechniqueError> {
        let floored = f.floor();
        if !floored.is_finite() || floored < i64::MIN as f64 || floored >= i64::MAX as f64 {
            return Err(TechniqueError::InvalidFormat("value is outside the i64 range".to_string()));
        }
        Ok(floored as i64)
    };

    match value {
        FieldValue::Integer(i) => Ok(*i),
        FieldValue::Decimal(f) => as_integer(*f),
        FieldValue::Text(s) => match s.trim().parse::<i64>() {
            Ok(i) => Ok(i),
            Err(_) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| TechniqueError::InvalidFormat("value is not numeric".to_string()))
                .and_then(as_integer),
        },
        FieldValue::Date(_) => Err(TechniqueError::InvalidFormat(
            "dates need a date_bucket generalization".to_string(),
        )),
        FieldValue::Null => Err(TechniqueError::InvalidFormat("value is null".to_string())),
    }
}

fn date_input(value: &FieldValue) -> Result<NaiveDate, TechniqueError> {
    match value {
        FieldValue::Date(d) => Ok(*d),
        FieldValue::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|_| TechniqueError::InvalidFormat("value is not a YYYY-MM-DD date".to_string())),
        _ => Err(TechniqueError::InvalidFormat("value is not a date".to_string())),
    }
}

impl FieldOperator for GeneralizeParams {
    fn apply(
        &self,
        value: &FieldValue,
        ctx: &mut OperatorContext<'_>,
    ) -> Result<FieldOutcome, TechniqueError> {
        if value.is_null() {
            return Ok(FieldOutcome::Value(FieldValue::Null));
        }

        let generalized = match self {
            Self::NumericBucket { width } => bucket(numeric_input(value)?, *width)?.to_string(),
            Self::PostalPrefix {
                prefix_len,
                wildcard,
            } => {
                let text = value.as_text().unwrap_or_default();
                postal_prefix(&text, *prefix_len, *wildcard)?
            }
            Self::DateBucket { width, unit, mode } => {
                let date = date_input(value)?;
                let ordinal = date_ordinal(date, *unit, *mode, ctx.reference_date);
                bucket(ordinal, *width)?.to_string()
            }
        };

        Ok(FieldOutcome::Value(FieldValue::Text(generalized)))
    }
}
