//! Sharded in-memory correspondence table with optional journal

use crate::domain::errors::StoreError;
use crate::domain::ids::{Pseudonym, TechniqueId};
use crate::store::crypto::{SealedValue, ValueProtector};
use crate::store::journal::{Journal, JournalEvent};
use crate::store::{CorrespondenceStore, Credential, MappingMode, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Attempts at drawing an unused random pseudonym before giving up
const MAX_PSEUDONYM_ATTEMPTS: usize = 8;

/// A stored mapping; never contains the original in plaintext
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceEntry {
    /// Namespace
    pub technique_id: TechniqueId,

    /// HMAC-SHA256 lookup digest of the original
    pub digest: String,

    /// Pseudonym handed out for the original
    pub pseudonym: Pseudonym,

    /// Reversible or one-way
    pub mode: MappingMode,

    /// Encrypted original, present for reversible entries only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sealed: Option<SealedValue>,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EntryKey {
    technique_id: TechniqueId,
    digest: String,
}

type Slot = Arc<OnceCell<Arc<CorrespondenceEntry>>>;

/// Mode held by a technique id
///
/// A mode is claimed by the first creation in a namespace and only becomes
/// permanent once an entry is stored. If every pending creation fails the
/// namespace is free again.
#[derive(Debug, Clone, Copy)]
struct ModePin {
    mode: MappingMode,
    pending: usize,
    committed: bool,
}

/// Releases a pending mode claim when a creation finishes or is cancelled
struct ModeClaim<'a> {
    modes: &'a DashMap<TechniqueId, ModePin>,
    technique_id: &'a TechniqueId,
    created: bool,
}

impl Drop for ModeClaim<'_> {
    fn drop(&mut self) {
        if let Entry::Occupied(mut occupied) = self.modes.entry(self.technique_id.clone()) {
            let pin = occupied.get_mut();
            pin.pending = pin.pending.saturating_sub(1);
            pin.committed |= self.created;
            if pin.pending == 0 && !pin.committed {
                occupied.remove();
            }
        }
    }
}

/// Correspondence store backed by sharded concurrent maps
///
/// Each `(technique id, original)` key owns a [`OnceCell`]: the first caller
/// creates the entry while concurrent callers for the same key wait on that
/// cell only. Keys in different shards never contend.
///
/// # Examples
///
/// ```
/// use veil::store::{CorrespondenceStore, CorrespondenceTable, MappingMode, ValueProtector};
/// use veil::domain::TechniqueId;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let table = CorrespondenceTable::new(ValueProtector::ephemeral()?);
/// let id = TechniqueId::new("customer")?;
/// let a = table.get_or_create(&id, "jane", MappingMode::Reversible, "PSN_").await?;
/// let b = table.get_or_create(&id, "jane", MappingMode::Reversible, "PSN_").await?;
/// assert_eq!(a, b);
/// # Ok(())
/// # }
/// ```
pub struct CorrespondenceTable {
    protector: Arc<ValueProtector>,
    entries: DashMap<EntryKey, Slot>,
    by_pseudonym: DashMap<(TechniqueId, Pseudonym), String>,
    modes: DashMap<TechniqueId, ModePin>,
    journal: Option<Journal>,
}

impl CorrespondenceTable {
    /// In-memory table
    pub fn new(protector: ValueProtector) -> Self {
        Self {
            protector: Arc::new(protector),
            entries: DashMap::new(),
            by_pseudonym: DashMap::new(),
            modes: DashMap::new(),
            journal: None,
        }
    }

    /// Table persisted to a JSON-lines journal, replaying existing entries
    ///
    /// # Errors
    ///
    /// Fails when the journal cannot be read or written, or when its reversible
    /// entries were sealed with a different encryption key.
    pub async fn open_journaled(
        protector: ValueProtector,
        path: impl AsRef<Path>,
    ) -> StoreResult<Self> {
        let (journal, events) = Journal::open(path).await?;
        let mut table = Self::new(protector);

        for event in events {
            match event {
                JournalEvent::Insert { entry } => table.restore(entry),
                JournalEvent::Purge { technique_id, .. } => {
                    table.remove_technique(&technique_id);
                }
            }
        }

        table.check_keys()?;

        tracing::info!(
            path = %journal.path().display(),
            entries = table.entry_count(),
            "Correspondence table restored from journal"
        );

        table.journal = Some(journal);
        Ok(table)
    }

    /// Shared protector, used for local one-way fallbacks
    pub fn protector(&self) -> Arc<ValueProtector> {
        Arc::clone(&self.protector)
    }

    fn restore(&self, entry: CorrespondenceEntry) {
        let key = EntryKey {
            technique_id: entry.technique_id.clone(),
            digest: entry.digest.clone(),
        };
        self.modes.insert(
            entry.technique_id.clone(),
            ModePin {
                mode: entry.mode,
                pending: 0,
                committed: true,
            },
        );
        self.by_pseudonym.insert(
            (entry.technique_id.clone(), entry.pseudonym.clone()),
            entry.digest.clone(),
        );
        self.entries
            .insert(key, Arc::new(OnceCell::new_with(Some(Arc::new(entry)))));
    }

    fn check_keys(&self) -> StoreResult<()> {
        let sample = self.entries.iter().find_map(|slot| {
            slot.value()
                .get()
                .filter(|entry| entry.sealed.is_some())
                .cloned()
        });
        if let Some(entry) = sample {
            if let Some(sealed) = &entry.sealed {
                self.protector.open(&entry.technique_id, sealed).map_err(|_| {
                    StoreError::Crypto(
                        "journal entries cannot be decrypted with the configured key".to_string(),
                    )
                })?;
            }
        }
        Ok(())
    }

    fn entry_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|slot| slot.value().initialized())
            .count()
    }

    fn remove_technique(&self, technique_id: &TechniqueId) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, slot| {
            if key.technique_id == *technique_id {
                if slot.initialized() {
                    removed += 1;
                }
                false
            } else {
                true
            }
        });
        self.by_pseudonym.retain(|(id, _), _| id != technique_id);
        self.modes.remove(technique_id);
        removed
    }

    fn claim_mode<'a>(
        &'a self,
        technique_id: &'a TechniqueId,
        mode: MappingMode,
    ) -> StoreResult<ModeClaim<'a>> {
        match self.modes.entry(technique_id.clone()) {
            Entry::Occupied(existing) if existing.get().mode != mode => {
                return Err(StoreError::ModeConflict(technique_id.to_string()));
            }
            Entry::Occupied(mut existing) => existing.get_mut().pending += 1,
            Entry::Vacant(vacant) => {
                vacant.insert(ModePin {
                    mode,
                    pending: 1,
                    committed: false,
                });
            }
        }
        Ok(ModeClaim {
            modes: &self.modes,
            technique_id,
            created: false,
        })
    }

    /// Claim `pseudonym` for `digest`; false when another original holds it
    fn reserve(&self, technique_id: &TechniqueId, pseudonym: &Pseudonym, digest: &str) -> bool {
        match self
            .by_pseudonym
            .entry((technique_id.clone(), pseudonym.clone()))
        {
            Entry::Occupied(existing) => existing.get() == digest,
            Entry::Vacant(vacant) => {
                vacant.insert(digest.to_string());
                true
            }
        }
    }

    fn release(&self, technique_id: &TechniqueId, pseudonym: &Pseudonym) {
        self.by_pseudonym
            .remove(&(technique_id.clone(), pseudonym.clone()));
    }

    fn allocate_pseudonym(
        &self,
        technique_id: &TechniqueId,
        original: &str,
        digest: &str,
        mode: MappingMode,
        prefix: &str,
    ) -> StoreResult<Pseudonym> {
        match mode {
            MappingMode::OneWay => {
                let pseudonym = self.protector.one_way_pseudonym(technique_id, original, prefix);
                if self.reserve(technique_id, &pseudonym, digest) {
                    Ok(pseudonym)
                } else {
                    Err(StoreError::Crypto(format!(
                        "one-way pseudonym collision in technique '{technique_id}'"
                    )))
                }
            }
            MappingMode::Reversible => {
                for attempt in 1..=MAX_PSEUDONYM_ATTEMPTS {
                    let random = rand::thread_rng().next_u64();
                    let pseudonym = Pseudonym::new(format!("{prefix}{random:016x}"));
                    if self.reserve(technique_id, &pseudonym, digest) {
                        return Ok(pseudonym);
                    }
                    tracing::debug!(
                        technique_id = %technique_id,
                        attempt,
                        "Pseudonym collision, drawing again"
                    );
                }
                Err(StoreError::Unavailable(format!(
                    "no free pseudonym after {MAX_PSEUDONYM_ATTEMPTS} attempts"
                )))
            }
        }
    }

    async fn create_entry(
        &self,
        technique_id: &TechniqueId,
        original: &str,
        digest: &str,
        mode: MappingMode,
        prefix: &str,
    ) -> StoreResult<Arc<CorrespondenceEntry>> {
        let sealed = match mode {
            MappingMode::Reversible => Some(self.protector.seal(technique_id, original)?),
            MappingMode::OneWay => None,
        };
        let pseudonym = self.allocate_pseudonym(technique_id, original, digest, mode, prefix)?;

        let entry = CorrespondenceEntry {
            technique_id: technique_id.clone(),
            digest: digest.to_string(),
            pseudonym,
            mode,
            sealed,
            created_at: Utc::now(),
        };

        if let Some(journal) = &self.journal {
            let event = JournalEvent::Insert {
                entry: entry.clone(),
            };
            if let Err(e) = journal.append(&event).await {
                self.release(technique_id, &entry.pseudonym);
                return Err(e);
            }
        }

        tracing::debug!(
            technique_id = %technique_id,
            mode = %mode,
            "Created correspondence entry"
        );

        Ok(Arc::new(entry))
    }
}

#[async_trait]
impl CorrespondenceStore for CorrespondenceTable {
    async fn get_or_create(
        &self,
        technique_id: &TechniqueId,
        original: &str,
        mode: MappingMode,
        prefix: &str,
    ) -> StoreResult<Pseudonym> {
        let mut claim = self.claim_mode(technique_id, mode)?;

        let digest = self.protector.lookup_digest(technique_id, original);
        let key = EntryKey {
            technique_id: technique_id.clone(),
            digest: digest.clone(),
        };
        let slot: Slot = self
            .entries
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        let entry = slot
            .get_or_try_init(|| self.create_entry(technique_id, original, &digest, mode, prefix))
            .await?;
        claim.created = true;
        drop(claim);

        if entry.mode != mode {
            return Err(StoreError::ModeConflict(technique_id.to_string()));
        }
        Ok(entry.pseudonym.clone())
    }

    async fn reverse(
        &self,
        technique_id: &TechniqueId,
        pseudonym: &Pseudonym,
        credential: &Credential,
    ) -> StoreResult<String> {
        credential.authorize_reverse(technique_id)?;

        let not_found = || {
            StoreError::NotFound(format!(
                "pseudonym '{pseudonym}' in technique '{technique_id}'"
            ))
        };

        let digest = self
            .by_pseudonym
            .get(&(technique_id.clone(), pseudonym.clone()))
            .map(|d| d.value().clone())
            .ok_or_else(not_found)?;

        let entry = self
            .entries
            .get(&EntryKey {
                technique_id: technique_id.clone(),
                digest,
            })
            .and_then(|slot| slot.value().get().cloned())
            .ok_or_else(not_found)?;

        let sealed = entry.sealed.as_ref().ok_or_else(not_found)?;

        tracing::info!(
            technique_id = %technique_id,
            principal = %credential.principal,
            "Pseudonym reversed"
        );

        self.protector.open(technique_id, sealed)
    }

    async fn purge(&self, technique_id: &TechniqueId) -> StoreResult<usize> {
        if let Some(journal) = &self.journal {
            journal
                .append(&JournalEvent::Purge {
                    technique_id: technique_id.clone(),
                    at: Utc::now(),
                })
                .await?;
        }

        let removed = self.remove_technique(technique_id);
        tracing::warn!(
            technique_id = %technique_id,
            removed,
            "Purged correspondence entries"
        );
        Ok(removed)
    }

    async fn len(&self) -> StoreResult<usize> {
        Ok(self.entry_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::REVERSE_ALL_SCOPE;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn id(s: &str) -> TechniqueId {
        TechniqueId::new(s).unwrap()
    }

    fn protector() -> ValueProtector {
        ValueProtector::new(&[3u8; 32], &[5u8; 32]).unwrap()
    }

    fn admin() -> Credential {
        Credential::new("admin", vec![REVERSE_ALL_SCOPE.to_string()])
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let table = CorrespondenceTable::new(protector());
        let a = table
            .get_or_create(&id("customer"), "jane", MappingMode::Reversible, "PSN_")
            .await
            .unwrap();
        let b = table
            .get_or_create(&id("customer"), "jane", MappingMode::Reversible, "PSN_")
            .await
            .unwrap();
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("PSN_"));
        assert_eq!(a.as_str().len(), 4 + 16);
        assert!(a.as_str()[4..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(table.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_distinct_originals_get_distinct_pseudonyms() {
        let table = CorrespondenceTable::new(protector());
        let mut seen = HashSet::new();
        for i in 0..200 {
            let p = table
                .get_or_create(&id("customer"), &format!("user{i}"), MappingMode::Reversible, "P_")
                .await
                .unwrap();
            assert!(seen.insert(p));
        }
    }

    #[tokio::test]
    async fn test_concurrent_creation_yields_one_pseudonym() {
        let table = Arc::new(CorrespondenceTable::new(protector()));
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let table = Arc::clone(&table);
                tokio::spawn(async move {
                    table
                        .get_or_create(&id("customer"), "same", MappingMode::Reversible, "PSN_")
                        .await
                        .unwrap()
                })
            })
            .collect();

        let results: HashSet<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(results.len(), 1);
        assert_eq!(table.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reverse_round_trip() {
        let table = CorrespondenceTable::new(protector());
        let p = table
            .get_or_create(&id("customer"), "jane.doe@corp.com", MappingMode::Reversible, "PSN_")
            .await
            .unwrap();
        let original = table.reverse(&id("customer"), &p, &admin()).await.unwrap();
        assert_eq!(original, "jane.doe@corp.com");
    }

    #[tokio::test]
    async fn test_reverse_checks_credential_first() {
        let table = CorrespondenceTable::new(protector());
        let nobody = Credential::new("analyst", vec![]);
        let err = table
            .reverse(&id("customer"), &Pseudonym::new("PSN_unknown"), &nobody)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_one_way_entries_have_no_reverse_path() {
        let table = CorrespondenceTable::new(protector());
        let p = table
            .get_or_create(&id("email"), "jane", MappingMode::OneWay, "PSN_")
            .await
            .unwrap();
        let again = table
            .get_or_create(&id("email"), "jane", MappingMode::OneWay, "PSN_")
            .await
            .unwrap();
        assert_eq!(p, again);

        let err = table.reverse(&id("email"), &p, &admin()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mode_conflict() {
        let table = CorrespondenceTable::new(protector());
        table
            .get_or_create(&id("customer"), "a", MappingMode::Reversible, "PSN_")
            .await
            .unwrap();
        let err = table
            .get_or_create(&id("customer"), "b", MappingMode::OneWay, "PSN_")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ModeConflict(_)));
    }

    #[tokio::test]
    async fn test_failed_first_creation_leaves_mode_unset() {
        let table = CorrespondenceTable::new(protector());
        let customer = id("customer");

        // Creation fails or is cancelled before any entry is stored
        let claim = table.claim_mode(&customer, MappingMode::OneWay).unwrap();
        drop(claim);
        assert!(table.modes.get(&customer).is_none());

        let pseudonym = table
            .get_or_create(&customer, "a", MappingMode::Reversible, "PSN_")
            .await
            .unwrap();
        assert!(pseudonym.as_str().starts_with("PSN_"));
        let err = table
            .get_or_create(&customer, "b", MappingMode::OneWay, "PSN_")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ModeConflict(_)));
    }

    #[tokio::test]
    async fn test_pending_claim_blocks_other_mode() {
        let table = CorrespondenceTable::new(protector());
        let customer = id("customer");

        let first = table.claim_mode(&customer, MappingMode::Reversible).unwrap();
        assert!(matches!(
            table.claim_mode(&customer, MappingMode::OneWay),
            Err(StoreError::ModeConflict(_))
        ));
        let second = table.claim_mode(&customer, MappingMode::Reversible).unwrap();
        drop(first);
        assert!(table.modes.get(&customer).is_some());
        drop(second);
        assert!(table.modes.get(&customer).is_none());
    }

    #[tokio::test]
    async fn test_purge_removes_only_one_namespace() {
        let table = CorrespondenceTable::new(protector());
        let p = table
            .get_or_create(&id("customer"), "a", MappingMode::Reversible, "PSN_")
            .await
            .unwrap();
        table
            .get_or_create(&id("patient"), "a", MappingMode::Reversible, "PSN_")
            .await
            .unwrap();

        assert_eq!(table.purge(&id("customer")).await.unwrap(), 1);
        assert_eq!(table.len().await.unwrap(), 1);
        let err = table.reverse(&id("customer"), &p, &admin()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_journal_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.jsonl");

        let table = CorrespondenceTable::open_journaled(protector(), &path)
            .await
            .unwrap();
        let p = table
            .get_or_create(&id("customer"), "jane", MappingMode::Reversible, "PSN_")
            .await
            .unwrap();
        table
            .get_or_create(&id("gone"), "x", MappingMode::OneWay, "PSN_")
            .await
            .unwrap();
        table.purge(&id("gone")).await.unwrap();
        drop(table);

        let journal = std::fs::read_to_string(&path).unwrap();
        assert!(!journal.contains("jane"));

        let reopened = CorrespondenceTable::open_journaled(protector(), &path)
            .await
            .unwrap();
        assert_eq!(reopened.len().await.unwrap(), 1);
        let again = reopened
            .get_or_create(&id("customer"), "jane", MappingMode::Reversible, "PSN_")
            .await
            .unwrap();
        assert_eq!(p, again);
        assert_eq!(
            reopened.reverse(&id("customer"), &p, &admin()).await.unwrap(),
            "jane"
        );
    }

    #[tokio::test]
    async fn test_journal_with_wrong_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.jsonl");
        let table = CorrespondenceTable::open_journaled(protector(), &path)
            .await
            .unwrap();
        table
            .get_or_create(&id("customer"), "jane", MappingMode::Reversible, "PSN_")
            .await
            .unwrap();
        drop(table);

        let other = ValueProtector::new(&[4u8; 32], &[5u8; 32]).unwrap();
        let err = CorrespondenceTable::open_journaled(other, &path)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StoreError::Crypto(_)));
    }
}
