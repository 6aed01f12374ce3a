//! Technique definitions
//!
//! A [`Technique`] is a tagged variant with strongly typed parameters per
//! variant, so an unknown technique or a missing parameter is a configuration
//! error at load time rather than a runtime surprise.
//!
//! In TOML policies a technique is written as an inline table tagged by
//! `technique`:
//!
//! ```toml
//! techniques = [
//!     { technique = "mask", keep_leading = 1 },
//!     { technique = "generalize", kind = "numeric_bucket", width = 5 },
//! ]
//! ```

use crate::domain::errors::TechniqueError;
use crate::domain::ids::TechniqueId;
use serde::{Deserialize, Serialize};

/// One transformation step applied to a field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "technique", rename_all = "snake_case")]
pub enum Technique {
    /// Format-preserving partial reveal
    Mask(MaskParams),
    /// Replace with a pseudonym from the correspondence store
    Pseudonymize(PseudonymizeParams),
    /// Bucket numbers and dates, truncate postal codes
    Generalize(GeneralizeParams),
    /// Add bounded random noise to numbers
    Perturb(PerturbParams),
    /// Replace the field with a sentinel or drop the whole record
    Suppress(SuppressParams),
}

impl Technique {
    /// Short name used in logs and summaries
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mask(_) => "mask",
            Self::Pseudonymize(_) => "pseudonymize",
            Self::Generalize(_) => "generalize",
            Self::Perturb(_) => "perturb",
            Self::Suppress(_) => "suppress",
        }
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<(), TechniqueError> {
        match self {
            Self::Mask(params) => params.validate(),
            Self::Pseudonymize(_) => Ok(()),
            Self::Generalize(params) => params.validate(),
            Self::Perturb(params) => params.validate(),
            Self::Suppress(_) => Ok(()),
        }
    }
}

/// Which masking rule to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskFormat {
    /// Keep the start of the local part and the whole domain
    Email,
    /// Mask digits between kept leading/trailing digits, keep separators
    Digits,
    /// Mask characters between kept leading/trailing characters
    Characters,
}

/// Parameters for [`Technique::Mask`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskParams {
    /// Character used for masking
    #[serde(default = "default_mask_char")]
    pub mask_char: char,

    /// Leading characters (or digits, or local-part characters) left visible
    #[serde(default = "default_keep_leading")]
    pub keep_leading: usize,

    /// Trailing characters (or digits) left visible; unused for emails
    #[serde(default)]
    pub keep_trailing: usize,

    /// Length of the fixed mask token written into email local parts
    #[serde(default = "default_token_len")]
    pub token_len: usize,

    /// Masking rule; derived from the declared field type when absent
    #[serde(default)]
    pub format: Option<MaskFormat>,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            mask_char: default_mask_char(),
            keep_leading: default_keep_leading(),
            keep_trailing: 0,
            token_len: default_token_len(),
            format: None,
        }
    }
}

impl MaskParams {
    fn validate(&self) -> Result<(), TechniqueError> {
        if self.token_len == 0 {
            return Err(TechniqueError::InvalidParameters(
                "mask.token_len must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters for [`Technique::Pseudonymize`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PseudonymizeParams {
    /// Correspondence store namespace
    pub technique_id: TechniqueId,

    /// Keep a reversible mapping; falls back to `engine.reversible_by_default`
    #[serde(default)]
    pub reversible: Option<bool>,

    /// Pseudonym prefix
    #[serde(default = "default_pseudonym_prefix")]
    pub prefix: String,
}

impl PseudonymizeParams {
    /// Create parameters for a namespace with the default prefix
    pub fn new(technique_id: TechniqueId) -> Self {
        Self {
            technique_id,
            reversible: None,
            prefix: default_pseudonym_prefix(),
        }
    }
}

/// How a date is turned into an integer before bucketing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateMode {
    /// Whole units elapsed between the date and the reference date
    Age,
    /// The date's own position (year, absolute month index, day number)
    Calendar,
}

/// Unit used when converting dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateUnit {
    /// Calendar years
    Years,
    /// Calendar months
    Months,
    /// Days
    Days,
}

/// Parameters for [`Technique::Generalize`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneralizeParams {
    /// `[floor(v / w) * w, lower + w - 1]`
    NumericBucket {
        /// Bucket width, > 0
        width: i64,
    },
    /// Keep a prefix, pad the rest with a wildcard
    PostalPrefix {
        /// Characters kept
        prefix_len: usize,
        /// Padding character
        #[serde(default = "default_wildcard")]
        wildcard: char,
    },
    /// Convert a date to an integer, then bucket it
    DateBucket {
        /// Bucket width in `unit`, > 0
        width: i64,
        /// Conversion unit
        #[serde(default = "default_date_unit")]
        unit: DateUnit,
        /// Conversion mode
        #[serde(default = "default_date_mode")]
        mode: DateMode,
    },
}

impl GeneralizeParams {
    fn validate(&self) -> Result<(), TechniqueError> {
        match self {
            Self::NumericBucket { width } | Self::DateBucket { width, .. } if *width <= 0 => {
                Err(TechniqueError::InvalidParameters(format!(
                    "generalize.width must be > 0, got {width}"
                )))
            }
            Self::PostalPrefix { prefix_len: 0, .. } => Err(TechniqueError::InvalidParameters(
                "generalize.prefix_len must be > 0".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Noise distribution for [`Technique::Perturb`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "snake_case")]
pub enum Noise {
    /// Uniform over `[-bound, +bound]`
    Uniform {
        /// Half-width of the interval
        bound: f64,
    },
    /// Laplace with scale `sensitivity / epsilon` (differential privacy mode)
    Laplace {
        /// Privacy budget, > 0
        epsilon: f64,
        /// Query sensitivity
        #[serde(default = "default_sensitivity")]
        sensitivity: f64,
    },
}

/// Parameters for [`Technique::Perturb`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbParams {
    /// Noise distribution
    pub noise: Noise,

    /// Lower domain bound; results are clamped to it
    #[serde(default)]
    pub min: Option<f64>,

    /// Upper domain bound; results are clamped to it
    #[serde(default)]
    pub max: Option<f64>,
}

impl PerturbParams {
    fn validate(&self) -> Result<(), TechniqueError> {
        match self.noise {
            Noise::Uniform { bound } if !(bound.is_finite() && bound >= 0.0) => {
                return Err(TechniqueError::InvalidParameters(format!(
                    "perturb.bound must be a finite value >= 0, got {bound}"
                )));
            }
            Noise::Laplace { epsilon, .. } if !(epsilon.is_finite() && epsilon > 0.0) => {
                return Err(TechniqueError::InvalidParameters(format!(
                    "perturb.epsilon must be > 0, got {epsilon}"
                )));
            }
            Noise::Laplace { sensitivity, .. } if !(sensitivity.is_finite() && sensitivity > 0.0) => {
                return Err(TechniqueError::InvalidParameters(format!(
                    "perturb.sensitivity must be > 0, got {sensitivity}"
                )));
            }
            _ => {}
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(TechniqueError::InvalidParameters(format!(
                    "perturb.min ({min}) is greater than perturb.max ({max})"
                )));
            }
        }
        Ok(())
    }
}

/// What a suppression removes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressScope {
    /// Replace the field with the sentinel
    Field,
    /// Drop the whole record
    Record,
}

/// Parameters for [`Technique::Suppress`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressParams {
    /// Field or record scope
    #[serde(default = "default_suppress_scope")]
    pub scope: SuppressScope,

    /// Replacement written for field-scope suppression
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
}

impl Default for SuppressParams {
    fn default() -> Self {
        Self {
            scope: default_suppress_scope(),
            sentinel: default_sentinel(),
        }
    }
}

fn default_mask_char() -> char {
    '*'
}

fn default_keep_leading() -> usize {
    1
}

fn default_token_len() -> usize {
    4
}

fn default_pseudonym_prefix() -> String {
    "PSN_".to_string()
}

fn default_wildcard() -> char {
    '*'
}

fn default_date_unit() -> DateUnit {
    DateUnit::Years
}

fn default_date_mode() -> DateMode {
    DateMode::Age
}

fn default_sensitivity() -> f64 {
    1.0
}

fn default_suppress_scope() -> SuppressScope {
    SuppressScope::Field
}

/// Sentinel written by field-scope suppression unless configured otherwise
pub const DEFAULT_SENTINEL: &str = "[SUPPRESSED]";

fn default_sentinel() -> String {
    DEFAULT_SENTINEL.to_string()
}
