//! Correspondence store
//!
//! The store is the single source of truth for pseudonyms: a `(technique id,
//! original)` pair resolves to the same pseudonym for the lifetime of the store,
//! whichever worker or invocation asks. Reversal is gated by a [`Credential`]
//! issued outside the engine.
//!
//! Backends:
//! - [`CorrespondenceTable`] keeps entries in memory
//! - [`CorrespondenceTable::open_journaled`] additionally appends every new
//!   entry to a JSON-lines journal and replays it on open
//!
//! Originals are never held in plaintext: entries are indexed by an HMAC-SHA256
//! digest and reversible entries carry an AES-256-GCM ciphertext (see
//! [`crypto`]).

pub mod crypto;
pub mod journal;
pub mod table;

pub use crypto::ValueProtector;
pub use table::CorrespondenceTable;

use crate::domain::errors::StoreError;
use crate::domain::ids::{Pseudonym, TechniqueId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Whether a mapping can be reversed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMode {
    /// Encrypted original kept; authorized callers may reverse
    Reversible,
    /// Digest only; no reverse path exists
    OneWay,
}

impl MappingMode {
    /// Mode from a `reversible` flag
    pub fn from_reversible(reversible: bool) -> Self {
        if reversible {
            Self::Reversible
        } else {
            Self::OneWay
        }
    }
}

impl fmt::Display for MappingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reversible => write!(f, "reversible"),
            Self::OneWay => write!(f, "one_way"),
        }
    }
}

/// Scope granting reversal for every technique id
pub const REVERSE_ALL_SCOPE: &str = "reverse:*";

/// An already issued caller identity with its scopes
///
/// # Examples
///
/// ```
/// use veil::store::Credential;
/// use veil::domain::TechniqueId;
///
/// let id = TechniqueId::new("customer").unwrap();
/// let credential = Credential::new("auditor", vec!["reverse:customer".to_string()]);
/// assert!(credential.can_reverse(&id));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Who is asking
    pub principal: String,

    /// Granted scopes, e.g. `reverse:*` or `reverse:<technique_id>`
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Credential {
    /// Create a credential
    pub fn new(principal: impl Into<String>, scopes: Vec<String>) -> Self {
        Self {
            principal: principal.into(),
            scopes,
        }
    }

    /// Whether this credential may reverse pseudonyms of `technique_id`
    pub fn can_reverse(&self, technique_id: &TechniqueId) -> bool {
        self.scopes.iter().any(|scope| {
            scope == REVERSE_ALL_SCOPE
                || scope
                    .strip_prefix("reverse:")
                    .is_some_and(|id| id == technique_id.as_str())
        })
    }

    /// Reject callers without reversal rights
    pub fn authorize_reverse(&self, technique_id: &TechniqueId) -> StoreResult<()> {
        if self.can_reverse(technique_id) {
            Ok(())
        } else {
            Err(StoreError::Unauthorized(format!(
                "principal '{}' lacks scope reverse:{technique_id}",
                self.principal
            )))
        }
    }
}

/// Mapping between originals and pseudonyms
///
/// Implementations must be safe to share between workers: concurrent
/// `get_or_create` calls for the same key observe a single creation, and calls
/// for distinct keys must not serialize on one global lock.
#[async_trait]
pub trait CorrespondenceStore: Send + Sync {
    /// Return the existing pseudonym for `original` or create one
    ///
    /// `prefix` only shapes newly created pseudonyms. A failed call never
    /// commits a mapping.
    async fn get_or_create(
        &self,
        technique_id: &TechniqueId,
        original: &str,
        mode: MappingMode,
        prefix: &str,
    ) -> StoreResult<Pseudonym>;

    /// Recover the original behind a pseudonym
    ///
    /// The credential is checked before any lookup. Unknown pseudonyms and
    /// one-way entries both yield `NotFound`.
    async fn reverse(
        &self,
        technique_id: &TechniqueId,
        pseudonym: &Pseudonym,
        credential: &Credential,
    ) -> StoreResult<String>;

    /// Delete every entry of a technique id, returning how many were removed
    async fn purge(&self, technique_id: &TechniqueId) -> StoreResult<usize>;

    /// Number of stored entries
    async fn len(&self) -> StoreResult<usize>;

    /// Whether the store holds no entries
    async fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TechniqueId {
        TechniqueId::new(s).unwrap()
    }

    #[test]
    fn test_credential_scopes() {
        let all = Credential::new("admin", vec![REVERSE_ALL_SCOPE.to_string()]);
        assert!(all.can_reverse(&id("customer")));

        let one = Credential::new("auditor", vec!["reverse:customer".to_string()]);
        assert!(one.can_reverse(&id("customer")));
        assert!(!one.can_reverse(&id("patient")));
        assert!(!one.can_reverse(&id("customer2")));

        let none = Credential::new("analyst", vec!["read".to_string()]);
        let err = none.authorize_reverse(&id("customer")).unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized(_)));
    }

    #[test]
    fn test_mapping_mode_from_flag() {
        assert_eq!(MappingMode::from_reversible(true), MappingMode::Reversible);
        assert_eq!(MappingMode::from_reversible(false), MappingMode::OneWay);
        assert_eq!(MappingMode::OneWay.to_string(), "one_way");
    }
}
