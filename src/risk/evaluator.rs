//! Quasi-identifier equivalence classes and k-anonymity scoring

use super::report::{ClassDistribution, Recommendation, RecordRisk, RiskReport};
use crate::domain::errors::VeilError;
use crate::domain::record::Record;
use crate::domain::result::Result;
use crate::domain::value::FieldValue;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Default generalization floor for a `k_min`: `ceil(k_min / 2)`, at least 2
pub fn default_generalize_floor(k_min: usize) -> usize {
    k_min.div_ceil(2).max(2)
}

/// Read-only risk evaluator
///
/// # Examples
///
/// ```
/// use veil::domain::Record;
/// use veil::risk::{Recommendation, RiskEvaluator};
///
/// let evaluator = RiskEvaluator::new(vec![vec!["zip".to_string()]], 2).unwrap();
/// let records = vec![
///     Record::new().with("zip", "280**"),
///     Record::new().with("zip", "280**"),
///     Record::new().with("zip", "281**"),
/// ];
/// let report = evaluator.evaluate(&records);
/// assert_eq!(report.records[2].recommendation, Recommendation::Suppress);
/// ```
#[derive(Debug, Clone)]
pub struct RiskEvaluator {
    quasi_identifiers: Vec<Vec<String>>,
    k_min: usize,
    generalize_floor: usize,
    outlier_detection: bool,
    outlier_ignore: HashSet<String>,
}

impl RiskEvaluator {
    /// Create an evaluator
    ///
    /// # Errors
    ///
    /// `Configuration` when `k_min` is zero or a combination is empty.
    pub fn new(quasi_identifiers: Vec<Vec<String>>, k_min: usize) -> Result<Self> {
        if k_min == 0 {
            return Err(VeilError::Configuration("risk.k_min must be > 0".to_string()));
        }
        if let Some(position) = quasi_identifiers.iter().position(Vec::is_empty) {
            return Err(VeilError::Configuration(format!(
                "risk.quasi_identifiers[{position}] is empty"
            )));
        }
        Ok(Self {
            quasi_identifiers,
            k_min,
            generalize_floor: default_generalize_floor(k_min),
            outlier_detection: true,
            outlier_ignore: HashSet::new(),
        })
    }

    /// Override the generalization floor
    pub fn with_generalize_floor(mut self, floor: usize) -> Self {
        self.generalize_floor = floor;
        self
    }

    /// Configure outlier flagging
    pub fn with_outliers(mut self, enabled: bool, ignore: impl IntoIterator<Item = String>) -> Self {
        self.outlier_detection = enabled;
        self.outlier_ignore = ignore.into_iter().collect();
        self
    }

    /// Required minimum class size
    pub fn k_min(&self) -> usize {
        self.k_min
    }

    /// Recommendation for a class size
    pub fn recommend(&self, class_size: usize) -> Recommendation {
        if class_size >= self.k_min {
            Recommendation::Keep
        } else if class_size >= self.generalize_floor {
            Recommendation::GeneralizeFurther
        } else {
            Recommendation::Suppress
        }
    }

    /// Evaluate records
    ///
    /// Each combination is evaluated independently; a record's class size is
    /// the minimum over combinations. Without combinations every record is in
    /// one class of size `records.len()`.
    pub fn evaluate(&self, records: &[Record]) -> RiskReport {
        if records.is_empty() {
            return RiskReport::empty(self.k_min, self.generalize_floor);
        }

        let mut class_sizes = vec![usize::MAX; records.len()];
        let mut combinations = Vec::with_capacity(self.quasi_identifiers.len());

        for fields in &self.quasi_identifiers {
            let classes = equivalence_classes(records, fields);
            for members in classes.values() {
                for &index in members {
                    class_sizes[index] = class_sizes[index].min(members.len());
                }
            }
            combinations.push(distribution(fields, &classes));
        }

        if self.quasi_identifiers.is_empty() {
            class_sizes.fill(records.len());
        }

        let outliers = if self.outlier_detection {
            self.outliers(records)
        } else {
            vec![Vec::new(); records.len()]
        };

        let records: Vec<RecordRisk> = class_sizes
            .into_iter()
            .zip(outliers)
            .enumerate()
            .map(|(index, (class_size, outlier_fields))| RecordRisk {
                index,
                class_size,
                score: 1.0 / class_size as f64,
                recommendation: self.recommend(class_size),
                outlier_fields,
            })
            .collect();

        let achieved_k = records.iter().map(|r| r.class_size).min().unwrap_or(0);

        let report = RiskReport {
            k_min: self.k_min,
            generalize_floor: self.generalize_floor,
            achieved_k,
            records,
            combinations,
        };

        tracing::debug!(
            records = report.records.len(),
            achieved_k = report.achieved_k,
            suppress = report.count(Recommendation::Suppress),
            "Risk evaluation complete"
        );

        report
    }

    /// Per record, fields whose non-null value appears in no other record
    fn outliers(&self, records: &[Record]) -> Vec<Vec<String>> {
        let mut counts: HashMap<(&str, String), usize> = HashMap::new();
        for record in records {
            for (name, value) in record.iter() {
                if self.is_outlier_candidate(name, value) {
                    *counts.entry((name, value.canonical_key())).or_insert(0) += 1;
                }
            }
        }

        records
            .iter()
            .map(|record| {
                record
                    .iter()
                    .filter(|(name, value)| {
                        self.is_outlier_candidate(name, value)
                            && counts.get(&(*name, value.canonical_key())) == Some(&1)
                    })
                    .map(|(name, _)| name.to_string())
                    .collect()
            })
            .collect()
    }

    fn is_outlier_candidate(&self, name: &str, value: &FieldValue) -> bool {
        !value.is_null() && !self.outlier_ignore.contains(name)
    }
}

/// Value-tuple key to member indices, one linear pass
fn equivalence_classes(records: &[Record], fields: &[String]) -> HashMap<Vec<String>, Vec<usize>> {
    let mut classes: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        let key: Vec<String> = fields
            .iter()
            .map(|field| {
                record
                    .get(field)
                    .map(FieldValue::canonical_key)
                    .unwrap_or_else(|| FieldValue::Null.canonical_key())
            })
            .collect();
        classes.entry(key).or_default().push(index);
    }
    classes
}

fn distribution(fields: &[String], classes: &HashMap<Vec<String>, Vec<usize>>) -> ClassDistribution {
    let mut histogram = BTreeMap::new();
    for members in classes.values() {
        *histogram.entry(members.len()).or_insert(0) += 1;
    }
    let sizes: BTreeSet<usize> = histogram.keys().copied().collect();
    ClassDistribution {
        fields: fields.to_vec(),
        classes: classes.len(),
        smallest: sizes.first().copied().unwrap_or(0),
        largest: sizes.last().copied().unwrap_or(0),
        histogram,
    }
}
