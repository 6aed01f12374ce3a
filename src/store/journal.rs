//! Append-only JSON-lines journal for correspondence entries
//!
//! Each line is one [`JournalEvent`]. Replaying the file in order rebuilds the
//! table: inserts add entries, purges drop every entry of a technique id.
//! Originals never appear in the journal, only digests and ciphertexts.

use crate::domain::errors::StoreError;
use crate::domain::ids::TechniqueId;
use crate::store::table::CorrespondenceEntry;
use crate::store::StoreResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalEvent {
    /// A new correspondence entry
    Insert {
        /// The entry as stored
        entry: CorrespondenceEntry,
    },
    /// Every entry of a technique id was removed
    Purge {
        /// Purged namespace
        technique_id: TechniqueId,
        /// When the purge happened
        at: DateTime<Utc>,
    },
}

/// Append handle on a journal file
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    file: Mutex<File>,
}

impl Journal {
    /// Open (creating if needed) a journal and return the events already in it
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<(Self, Vec<JournalEvent>)> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| journal_error(&path, e))?;
        }

        let events = match tokio::fs::read_to_string(&path).await {
            Ok(content) => parse_events(&path, &content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(journal_error(&path, e)),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| journal_error(&path, e))?;

        tracing::debug!(
            path = %path.display(),
            events = events.len(),
            "Opened correspondence journal"
        );

        Ok((
            Self {
                path,
                file: Mutex::new(file),
            },
            events,
        ))
    }

    /// Append one event and flush it to disk
    pub async fn append(&self, event: &JournalEvent) -> StoreResult<()> {
        let mut line = serde_json::to_string(event)
            .map_err(|e| StoreError::Journal(format!("cannot encode journal event: {e}")))?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| journal_error(&self.path, e))?;
        file.sync_data()
            .await
            .map_err(|e| journal_error(&self.path, e))?;
        Ok(())
    }

    /// Journal location
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_events(path: &Path, content: &str) -> StoreResult<Vec<JournalEvent>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line).map_err(|e| {
                StoreError::Journal(format!(
                    "{} line {}: {e}",
                    path.display(),
                    number + 1
                ))
            })
        })
        .collect()
}

fn journal_error(path: &Path, err: std::io::Error) -> StoreError {
    StoreError::Journal(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::Pseudonym;
    use crate::store::MappingMode;
    use tempfile::TempDir;

    fn entry(pseudonym: &str) -> CorrespondenceEntry {
        CorrespondenceEntry {
            technique_id: TechniqueId::new("customer").unwrap(),
            digest: "ab".repeat(32),
            pseudonym: Pseudonym::new(pseudonym),
            mode: MappingMode::OneWay,
            sealed: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_and_replay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.jsonl");

        let (journal, events) = Journal::open(&path).await.unwrap();
        assert!(events.is_empty());

        let insert = JournalEvent::Insert {
            entry: entry("PSN_1"),
        };
        let purge = JournalEvent::Purge {
            technique_id: TechniqueId::new("customer").unwrap(),
            at: Utc::now(),
        };
        journal.append(&insert).await.unwrap();
        journal.append(&purge).await.unwrap();
        drop(journal);

        let (_journal, events) = Journal::open(&path).await.unwrap();
        assert_eq!(events, vec![insert, purge]);
    }

    #[tokio::test]
    async fn test_corrupt_line_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.jsonl");
        tokio::fs::write(&path, "{\"op\":\"insert\"\nnot json\n")
            .await
            .unwrap();

        let err = Journal::open(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Journal(ref msg) if msg.contains("line 1")));
    }
}
