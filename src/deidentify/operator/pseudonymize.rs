//! Pseudonymization through the correspondence store

use crate::deidentify::technique::PseudonymizeParams;
use crate::domain::errors::StoreError;
use crate::domain::ids::Pseudonym;
use crate::domain::value::FieldValue;
use crate::store::{CorrespondenceStore, MappingMode, ValueProtector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Prefix of pseudonyms derived locally while the store is unavailable
pub const FALLBACK_PREFIX: &str = "H_";

/// What to do when the store times out or is unavailable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFailureAction {
    /// Treat it as a field failure
    FailRecord,
    /// Derive a keyed one-way pseudonym locally with the `H_` prefix
    OneWayFallback,
}

impl Default for StoreFailureAction {
    fn default() -> Self {
        Self::FailRecord
    }
}

/// A pseudonymized field value
#[derive(Debug, Clone, PartialEq)]
pub enum PseudonymOutcome {
    /// Null stays null
    Null,
    /// Pseudonym issued by the store
    Stored(Pseudonym),
    /// Pseudonym derived locally after a store outage
    Fallback(Pseudonym),
}

impl PseudonymOutcome {
    /// Field value to write into the record
    pub fn into_value(self) -> FieldValue {
        match self {
            Self::Null => FieldValue::Null,
            Self::Stored(p) | Self::Fallback(p) => FieldValue::Text(p.into_inner()),
        }
    }
}

/// Store-backed pseudonymization operator
///
/// Every store call runs under `timeout`; a timeout counts as an outage.
pub struct Pseudonymizer {
    store: Arc<dyn CorrespondenceStore>,
    fallback: Arc<ValueProtector>,
    timeout: Duration,
    on_failure: StoreFailureAction,
    reversible_by_default: bool,
}

impl Pseudonymizer {
    /// Create an operator over a store
    ///
    /// `fallback` keys the local one-way pseudonyms used under
    /// [`StoreFailureAction::OneWayFallback`].
    pub fn new(
        store: Arc<dyn CorrespondenceStore>,
        fallback: Arc<ValueProtector>,
        timeout: Duration,
        on_failure: StoreFailureAction,
        reversible_by_default: bool,
    ) -> Self {
        Self {
            store,
            fallback,
            timeout,
            on_failure,
            reversible_by_default,
        }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn CorrespondenceStore> {
        &self.store
    }

    /// Mapping mode for a technique
    pub fn mode_for(&self, params: &PseudonymizeParams) -> MappingMode {
        MappingMode::from_reversible(params.reversible.unwrap_or(self.reversible_by_default))
    }

    /// Pseudonymize one value
    pub async fn apply(
        &self,
        params: &PseudonymizeParams,
        value: &FieldValue,
    ) -> Result<PseudonymOutcome, StoreError> {
        let Some(original) = value.as_text() else {
            return Ok(PseudonymOutcome::Null);
        };
        let mode = self.mode_for(params);

        let call = self
            .store
            .get_or_create(&params.technique_id, &original, mode, &params.prefix);
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        };

        match result {
            Ok(pseudonym) => Ok(PseudonymOutcome::Stored(pseudonym)),
            Err(err) if err.is_outage() && self.on_failure == StoreFailureAction::OneWayFallback => {
                tracing::warn!(
                    technique_id = %params.technique_id,
                    error = %err,
                    "Correspondence store unavailable, using one-way fallback pseudonym"
                );
                Ok(PseudonymOutcome::Fallback(self.fallback.one_way_pseudonym(
                    &params.technique_id,
                    &original,
                    FALLBACK_PREFIX,
                )))
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::TechniqueId;
    use crate::store::{CorrespondenceTable, Credential, StoreResult};
    use async_trait::async_trait;

    struct SlowStore;

    #[async_trait]
    impl CorrespondenceStore for SlowStore {
        async fn get_or_create(
            &self,
            _technique_id: &TechniqueId,
            _original: &str,
            _mode: MappingMode,
            _prefix: &str,
        ) -> StoreResult<Pseudonym> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Pseudonym::new("never"))
        }

        async fn reverse(
            &self,
            _technique_id: &TechniqueId,
            _pseudonym: &Pseudonym,
            _credential: &Credential,
        ) -> StoreResult<String> {
            Err(StoreError::Unavailable("slow".to_string()))
        }

        async fn purge(&self, _technique_id: &TechniqueId) -> StoreResult<usize> {
            Ok(0)
        }

        async fn len(&self) -> StoreResult<usize> {
            Ok(0)
        }
    }

    fn params() -> PseudonymizeParams {
        PseudonymizeParams::new(TechniqueId::new("customer").unwrap())
    }

    fn protector() -> Arc<ValueProtector> {
        Arc::new(ValueProtector::new(&[1u8; 32], &[2u8; 32]).unwrap())
    }

    #[tokio::test]
    async fn test_stored_pseudonym_is_stable() {
        let store = Arc::new(CorrespondenceTable::new(ValueProtector::ephemeral().unwrap()));
        let op = Pseudonymizer::new(
            store,
            protector(),
            Duration::from_secs(1),
            StoreFailureAction::FailRecord,
            true,
        );
        let a = op.apply(&params(), &FieldValue::from("u1")).await.unwrap();
        let b = op.apply(&params(), &FieldValue::from("u1")).await.unwrap();
        assert_eq!(a, b);
        assert!(matches!(a, PseudonymOutcome::Stored(_)));
        assert_eq!(
            op.apply(&params(), &FieldValue::Null).await.unwrap(),
            PseudonymOutcome::Null
        );
    }

    #[tokio::test]
    async fn test_timeout_fails_without_fallback() {
        let op = Pseudonymizer::new(
            Arc::new(SlowStore),
            protector(),
            Duration::from_millis(20),
            StoreFailureAction::FailRecord,
            true,
        );
        let err = op.apply(&params(), &FieldValue::from("u1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_timeout_uses_marked_fallback() {
        let op = Pseudonymizer::new(
            Arc::new(SlowStore),
            protector(),
            Duration::from_millis(20),
            StoreFailureAction::OneWayFallback,
            true,
        );
        let a = op.apply(&params(), &FieldValue::from("u1")).await.unwrap();
        let b = op.apply(&params(), &FieldValue::from("u1")).await.unwrap();
        assert_eq!(a, b);
        match a {
            PseudonymOutcome::Fallback(p) => assert!(p.as_str().starts_with(FALLBACK_PREFIX)),
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[test]
    fn test_mode_defaults() {
        let op = Pseudonymizer::new(
            Arc::new(SlowStore),
            protector(),
            Duration::from_millis(20),
            StoreFailureAction::FailRecord,
            false,
        );
        assert_eq!(op.mode_for(&params()), MappingMode::OneWay);
        let mut explicit = params();
        explicit.reversible = Some(true);
        assert_eq!(op.mode_for(&explicit), MappingMode::Reversible);
    }
}
