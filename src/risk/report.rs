//! Re-identification risk report

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Action suggested for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Class size meets `k_min`
    Keep,
    /// Below `k_min` but at or above the generalization floor
    GeneralizeFurther,
    /// Below the floor, unique records included
    Suppress,
}

/// Risk of one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRisk {
    /// Position in the evaluated dataset
    pub index: usize,

    /// Smallest equivalence class the record belongs to across combinations
    pub class_size: usize,

    /// `1 / class_size`
    pub score: f64,

    /// Suggested action
    pub recommendation: Recommendation,

    /// Fields holding a value no other record has
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outlier_fields: Vec<String>,
}

/// Equivalence-class statistics for one quasi-identifier combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDistribution {
    /// Quasi-identifier fields
    pub fields: Vec<String>,

    /// Number of distinct value tuples
    pub classes: usize,

    /// Smallest class size
    pub smallest: usize,

    /// Largest class size
    pub largest: usize,

    /// Class size to number of classes with that size
    pub histogram: BTreeMap<usize, usize>,
}

/// Risk report for a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    /// Required minimum class size
    pub k_min: usize,

    /// Minimum class size still fixable by generalization
    pub generalize_floor: usize,

    /// Smallest class size over all records, 0 for an empty dataset
    pub achieved_k: usize,

    /// Per-record results, in dataset order
    pub records: Vec<RecordRisk>,

    /// Per-combination class statistics
    pub combinations: Vec<ClassDistribution>,
}

impl RiskReport {
    /// Report for an empty dataset
    pub fn empty(k_min: usize, generalize_floor: usize) -> Self {
        Self {
            k_min,
            generalize_floor,
            achieved_k: 0,
            records: Vec::new(),
            combinations: Vec::new(),
        }
    }

    /// Whether no records were evaluated
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether every record meets `k_min`
    pub fn satisfies_k(&self) -> bool {
        self.records
            .iter()
            .all(|r| r.recommendation == Recommendation::Keep)
    }

    /// Number of records with a recommendation
    pub fn count(&self, recommendation: Recommendation) -> usize {
        self.records
            .iter()
            .filter(|r| r.recommendation == recommendation)
            .count()
    }

    /// Indices of records recommended for suppression
    pub fn suppress_indices(&self) -> Vec<usize> {
        self.indices_with(Recommendation::Suppress)
    }

    /// Indices of records with a given recommendation
    pub fn indices_with(&self, recommendation: Recommendation) -> Vec<usize> {
        self.records
            .iter()
            .filter(|r| r.recommendation == recommendation)
            .map(|r| r.index)
            .collect()
    }

    /// Highest per-record score
    pub fn max_score(&self) -> f64 {
        self.records.iter().map(|r| r.score).fold(0.0, f64::max)
    }

    /// Format report for console output
    pub fn format_console(&self) -> String {
        let mut output = String::new();

        output.push('\n');
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push_str("               RE-IDENTIFICATION RISK REPORT                   \n");
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push('\n');

        output.push_str("📊 SUMMARY\n");
        output.push_str("───────────────────────────────────────────────────────────────\n");
        output.push_str(&format!("  Records Evaluated:    {}\n", self.records.len()));
        output.push_str(&format!("  k_min:                {}\n", self.k_min));
        output.push_str(&format!("  Generalize Floor:     {}\n", self.generalize_floor));
        output.push_str(&format!("  Achieved k:           {}\n", self.achieved_k));
        output.push_str(&format!("  Max Record Score:     {:.3}\n", self.max_score()));
        output.push_str(&format!(
            "  Keep:                 {}\n",
            self.count(Recommendation::Keep)
        ));
        output.push_str(&format!(
            "  Generalize Further:   {}\n",
            self.count(Recommendation::GeneralizeFurther)
        ));
        output.push_str(&format!(
            "  Suppress:             {}\n",
            self.count(Recommendation::Suppress)
        ));
        output.push('\n');

        if !self.combinations.is_empty() {
            output.push_str("🔍 QUASI-IDENTIFIER COMBINATIONS\n");
            output.push_str("───────────────────────────────────────────────────────────────\n");
            for combo in &self.combinations {
                output.push_str(&format!("\n  [{}]\n", combo.fields.join(", ")));
                output.push_str(&format!("    Classes:   {}\n", combo.classes));
                output.push_str(&format!(
                    "    Sizes:     smallest {}, largest {}\n",
                    combo.smallest, combo.largest
                ));
                let histogram: Vec<String> = combo
                    .histogram
                    .iter()
                    .map(|(size, count)| format!("{size}x{count}"))
                    .collect();
                output.push_str(&format!("    Histogram: {}\n", histogram.join(" ")));
            }
            output.push('\n');
        }

        let outliers: Vec<&RecordRisk> = self
            .records
            .iter()
            .filter(|r| !r.outlier_fields.is_empty())
            .collect();
        if !outliers.is_empty() {
            output.push_str("⚠️  OUTLIERS\n");
            output.push_str("───────────────────────────────────────────────────────────────\n");
            for record in outliers.iter().take(20) {
                output.push_str(&format!(
                    "  • record {}: {}\n",
                    record.index,
                    record.outlier_fields.join(", ")
                ));
            }
            if outliers.len() > 20 {
                output.push_str(&format!("  … and {} more\n", outliers.len() - 20));
            }
            output.push('\n');
        }

        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push('\n');

        output
    }

    /// Format report as JSON
    pub fn format_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write report to file
    pub fn write_to_file(&self, path: &std::path::Path) -> std::io::Result<()> {
        let json = self.format_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}
