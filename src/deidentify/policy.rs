//! Field policies and their resolution
//!
//! A policy set is written in TOML as an array of tables:
//!
//! ```toml
//! [[policies]]
//! matcher = { field = "email" }
//! techniques = [{ technique = "mask", keep_leading = 1 }]
//!
//! [[policies]]
//! matcher = { type = "postal_code" }
//! precedence = 10
//! techniques = [{ technique = "generalize", kind = "postal_prefix", prefix_len = 3 }]
//! ```
//!
//! Resolution order: exact field name, then type and name-pattern matchers by
//! ascending precedence, then the global default technique list. With nothing
//! left, strict mode fails with `NoPolicyForField` and lenient mode passes the
//! field through unchanged.

use crate::deidentify::technique::Technique;
use crate::domain::errors::VeilError;
use crate::domain::result::Result;
use crate::domain::value::FieldType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Which fields a policy applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMatcher {
    /// Exact field name
    Field(String),
    /// Regular expression over field names (anchored by the author)
    Pattern(String),
    /// Declared field type
    Type(FieldType),
}

/// Per-policy override of the global strictness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Use `engine.strict_mode`
    #[default]
    Inherit,
    /// Field failures abort the batch
    Strict,
    /// Field failures pass the original through with a warning
    Lenient,
}

impl Strictness {
    /// Effective strictness given the global flag
    pub fn is_strict(self, global_strict: bool) -> bool {
        match self {
            Self::Inherit => global_strict,
            Self::Strict => true,
            Self::Lenient => false,
        }
    }
}

/// One field policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPolicy {
    /// What the policy matches
    pub matcher: FieldMatcher,

    /// Techniques applied in order, each to the previous output
    #[serde(default)]
    pub techniques: Vec<Technique>,

    /// Strictness override
    #[serde(default)]
    pub strictness: Strictness,

    /// Rank among non-exact matchers, lower wins; required for them
    #[serde(default)]
    pub precedence: Option<u32>,
}

impl FieldPolicy {
    /// Policy for one exact field name
    pub fn for_field(name: impl Into<String>, techniques: Vec<Technique>) -> Self {
        Self {
            matcher: FieldMatcher::Field(name.into()),
            techniques,
            strictness: Strictness::Inherit,
            precedence: None,
        }
    }

    /// Policy for every field of a declared type
    pub fn for_type(field_type: FieldType, precedence: u32, techniques: Vec<Technique>) -> Self {
        Self {
            matcher: FieldMatcher::Type(field_type),
            techniques,
            strictness: Strictness::Inherit,
            precedence: Some(precedence),
        }
    }

    /// Policy for field names matching a regular expression
    pub fn for_pattern(regex: impl Into<String>, precedence: u32, techniques: Vec<Technique>) -> Self {
        Self {
            matcher: FieldMatcher::Pattern(regex.into()),
            techniques,
            strictness: Strictness::Inherit,
            precedence: Some(precedence),
        }
    }

    /// Builder-style strictness override
    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }
}

/// Check a policy list: valid techniques and regexes, unique exact names, and
/// unique explicit precedence on every non-exact matcher
pub fn validate_policies(policies: &[FieldPolicy]) -> Result<()> {
    let mut names = HashSet::new();
    let mut ranks = HashMap::new();

    for (index, policy) in policies.iter().enumerate() {
        let label = || format!("policies[{index}]");

        for technique in &policy.techniques {
            technique
                .validate()
                .map_err(|e| VeilError::Configuration(format!("{}: {e}", label())))?;
        }

        match (&policy.matcher, policy.precedence) {
            (FieldMatcher::Field(name), _) => {
                if name.trim().is_empty() {
                    return Err(VeilError::Configuration(format!(
                        "{}: field name cannot be empty",
                        label()
                    )));
                }
                if !names.insert(name.as_str()) {
                    return Err(VeilError::Configuration(format!(
                        "{}: duplicate policy for field '{name}'",
                        label()
                    )));
                }
            }
            (_, None) => {
                return Err(VeilError::Configuration(format!(
                    "{}: type and pattern policies need an explicit precedence",
                    label()
                )));
            }
            (matcher, Some(rank)) => {
                if let FieldMatcher::Pattern(regex) = matcher {
                    Regex::new(regex).map_err(|e| {
                        VeilError::Configuration(format!("{}: invalid pattern: {e}", label()))
                    })?;
                }
                if let Some(other) = ranks.insert(rank, index) {
                    return Err(VeilError::Configuration(format!(
                        "{}: precedence {rank} already used by policies[{other}]",
                        label()
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Where a resolution came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySource {
    /// Exact field-name policy
    Exact,
    /// Type or pattern policy with this precedence
    Ranked(u32),
    /// Global default technique list
    Default,
    /// Lenient pass-through, nothing matched
    PassThrough,
}

/// Outcome of resolving one field
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPolicy {
    /// Techniques to apply, empty for pass-through
    pub techniques: Vec<Technique>,
    /// Effective strictness for this field
    pub strict: bool,
    /// Which rule produced the techniques
    pub source: PolicySource,
}

impl ResolvedPolicy {
    /// Whether the field is left untouched
    pub fn is_pass_through(&self) -> bool {
        self.source == PolicySource::PassThrough
    }
}

#[derive(Debug)]
enum RankedMatcher {
    Pattern(Regex),
    Type(FieldType),
}

impl RankedMatcher {
    fn matches(&self, field_name: &str, field_type: FieldType) -> bool {
        match self {
            Self::Pattern(regex) => regex.is_match(field_name),
            Self::Type(t) => *t == field_type,
        }
    }
}

/// Compiled policy set
///
/// # Examples
///
/// ```
/// use veil::deidentify::policy::{FieldPolicy, PolicyResolver, PolicySource};
/// use veil::deidentify::technique::{MaskParams, Technique};
/// use veil::domain::FieldType;
///
/// let resolver = PolicyResolver::new(
///     vec![FieldPolicy::for_field("email", vec![Technique::Mask(MaskParams::default())])],
///     None,
///     false,
/// ).unwrap();
///
/// let resolved = resolver.resolve("email", FieldType::Email).unwrap();
/// assert_eq!(resolved.source, PolicySource::Exact);
/// assert!(resolver.resolve("notes", FieldType::Text).unwrap().is_pass_through());
/// ```
#[derive(Debug)]
pub struct PolicyResolver {
    policies: Vec<FieldPolicy>,
    exact: HashMap<String, usize>,
    ranked: Vec<(u32, RankedMatcher, usize)>,
    default_technique: Option<Vec<Technique>>,
    strict: bool,
}

impl PolicyResolver {
    /// Validate and compile a policy set
    pub fn new(
        policies: Vec<FieldPolicy>,
        default_technique: Option<Vec<Technique>>,
        strict: bool,
    ) -> Result<Self> {
        validate_policies(&policies)?;
        if let Some(defaults) = &default_technique {
            for technique in defaults {
                technique
                    .validate()
                    .map_err(|e| VeilError::Configuration(format!("default_technique: {e}")))?;
            }
        }

        let mut exact = HashMap::new();
        let mut ranked = Vec::new();
        for (index, policy) in policies.iter().enumerate() {
            match (&policy.matcher, policy.precedence) {
                (FieldMatcher::Field(name), _) => {
                    exact.insert(name.clone(), index);
                }
                (FieldMatcher::Pattern(regex), Some(rank)) => {
                    let compiled = Regex::new(regex).map_err(|e| {
                        VeilError::Configuration(format!("policies[{index}]: invalid pattern: {e}"))
                    })?;
                    ranked.push((rank, RankedMatcher::Pattern(compiled), index));
                }
                (FieldMatcher::Type(t), Some(rank)) => {
                    ranked.push((rank, RankedMatcher::Type(*t), index));
                }
                // rejected by validate_policies
                (_, None) => {}
            }
        }
        ranked.sort_by_key(|(rank, _, _)| *rank);

        Ok(Self {
            policies,
            exact,
            ranked,
            default_technique,
            strict,
        })
    }

    /// Whether unmatched fields are an error
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Ordered techniques for a field
    ///
    /// # Errors
    ///
    /// `NoPolicyForField` in strict mode when no policy and no default applies.
    pub fn resolve(&self, field_name: &str, field_type: FieldType) -> Result<ResolvedPolicy> {
        if let Some(&index) = self.exact.get(field_name) {
            return Ok(self.from_policy(index, PolicySource::Exact));
        }

        if let Some((rank, _, index)) = self
            .ranked
            .iter()
            .find(|(_, matcher, _)| matcher.matches(field_name, field_type))
        {
            return Ok(self.from_policy(*index, PolicySource::Ranked(*rank)));
        }

        if let Some(defaults) = &self.default_technique {
            return Ok(ResolvedPolicy {
                techniques: defaults.clone(),
                strict: self.strict,
                source: PolicySource::Default,
            });
        }

        if self.strict {
            return Err(VeilError::NoPolicyForField(field_name.to_string()));
        }

        tracing::warn!(
            field = field_name,
            field_type = %field_type,
            "No policy matched, passing field through unchanged"
        );
        Ok(ResolvedPolicy {
            techniques: Vec::new(),
            strict: false,
            source: PolicySource::PassThrough,
        })
    }

    fn from_policy(&self, index: usize, source: PolicySource) -> ResolvedPolicy {
        let policy = &self.policies[index];
        ResolvedPolicy {
            techniques: policy.techniques.clone(),
            strict: policy.strictness.is_strict(self.strict),
            source,
        }
    }
}
