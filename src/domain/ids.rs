//! Domain identifier types with validation
//!
//! Newtype wrappers keep technique namespaces and pseudonyms from being mixed up
//! with ordinary field text.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Technique identifier newtype wrapper
///
/// Names a pseudonymization namespace in the correspondence store. The same
/// original value under the same technique id always maps to the same pseudonym.
///
/// # Examples
///
/// ```
/// use veil::domain::ids::TechniqueId;
/// use std::str::FromStr;
///
/// let id = TechniqueId::from_str("customer-email").unwrap();
/// assert_eq!(id.as_str(), "customer-email");
/// assert!(TechniqueId::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TechniqueId(String);

impl TechniqueId {
    /// Creates a new TechniqueId
    ///
    /// Technique ids are used as store namespaces and in credential scopes
    /// (`reverse:<technique_id>`), so they must be non-empty and free of
    /// whitespace and `:`.
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Technique ID cannot be empty".to_string());
        }
        if id.chars().any(|c| c.is_whitespace() || c == ':') {
            return Err(format!(
                "Technique ID '{id}' must not contain whitespace or ':'"
            ));
        }
        Ok(Self(id))
    }

    /// Returns the technique id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TechniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TechniqueId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TechniqueId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TechniqueId> for String {
    fn from(id: TechniqueId) -> Self {
        id.0
    }
}

impl AsRef<str> for TechniqueId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Pseudonym newtype wrapper
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pseudonym(String);

impl Pseudonym {
    /// Wraps an already generated pseudonym
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the pseudonym as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Pseudonym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Pseudonym {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_technique_id_validation() {
        assert!(TechniqueId::new("email").is_ok());
        assert!(TechniqueId::new("").is_err());
        assert!(TechniqueId::new("   ").is_err());
        assert!(TechniqueId::new("a:b").is_err());
    }

    #[test]
    fn test_technique_id_serde_rejects_invalid() {
        let ok: TechniqueId = serde_json::from_str("\"patient-id\"").unwrap();
        assert_eq!(ok.as_str(), "patient-id");
        assert!(serde_json::from_str::<TechniqueId>("\"bad id\"").is_err());
    }

    #[test]
    fn test_pseudonym_display() {
        let p = Pseudonym::new("PSN_00ab");
        assert_eq!(p.to_string(), "PSN_00ab");
        assert_eq!(p.into_inner(), "PSN_00ab");
    }
}
