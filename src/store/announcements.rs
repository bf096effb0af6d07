//! Announcement records: which message currently shows each slot.

use super::document::{DocumentStore, OnCorrupt};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PREFIX: &str = "announcements";

/// Persisted state of one announcement slot.
///
/// `message_id` is the last message known to show the slot. It may have been
/// deleted remotely since, so every use must tolerate "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnouncementRecord {
    pub key: String,
    pub channel_id: String,
    pub message_id: Option<String>,
    pub last_rendered_at: Option<DateTime<Utc>>,
    /// SHA-256 (hex) of the last rendered body, footer excluded.
    pub last_rendered_content_hash: Option<String>,
    pub last_sent_at: Option<DateTime<Utc>>,
}

/// Typed access to `announcements/<key>.json`.
#[derive(Debug, Clone)]
pub struct AnnouncementRepository {
    store: Arc<DocumentStore>,
}

impl AnnouncementRepository {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// Record for `key`, if the slot was ever published.
    ///
    /// An unreadable record is treated as absent; the next sync recreates it.
    pub fn get(&self, key: &str) -> Option<AnnouncementRecord> {
        self.store
            .load_or_default::<Option<AnnouncementRecord>>(&document_key(key))
    }

    /// Read-modify-write the record for `key`.
    ///
    /// The closure sees a fresh record (with `key` filled in) if none exists.
    /// When it fails, nothing is written.
    ///
    /// # Errors
    ///
    /// Returns the closure's error or a store error.
    pub fn update<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut AnnouncementRecord) -> Result<R>,
    ) -> Result<R> {
        self.store
            .update_with(&document_key(key), OnCorrupt::Reset, |record: &mut AnnouncementRecord| {
                if record.key.is_empty() {
                    record.key = key.to_owned();
                }
                f(record)
            })
    }

    /// All stored records, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be listed.
    pub fn list(&self) -> Result<Vec<AnnouncementRecord>> {
        Ok(self
            .store
            .keys_under(PREFIX)?
            .iter()
            .filter_map(|doc_key| self.store.load_or_default::<Option<AnnouncementRecord>>(doc_key))
            .collect())
    }
}

fn document_key(key: &str) -> String {
    format!("{PREFIX}/{key}")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn repo() -> (tempfile::TempDir, AnnouncementRepository) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DocumentStore::open(dir.path()).unwrap());
        (dir, AnnouncementRepository::new(store))
    }

    #[test]
    fn unknown_slot_has_no_record() {
        let (_dir, repo) = repo();
        assert!(repo.get("weekly-menu").is_none());
    }

    #[test]
    fn update_creates_record_with_key() {
        let (_dir, repo) = repo();
        repo.update("weekly-menu", |record| {
            record.channel_id = "100".into();
            record.message_id = Some("200".into());
            Ok(())
        })
        .unwrap();

        let record = repo.get("weekly-menu").unwrap();
        assert_eq!(record.key, "weekly-menu");
        assert_eq!(record.message_id.as_deref(), Some("200"));
        assert_eq!(repo.list().unwrap(), vec![record]);
    }

    #[test]
    fn invalid_slot_key_is_rejected() {
        let (_dir, repo) = repo();
        assert!(repo.update("Weekly Menu", |_| Ok(())).is_err());
    }
}
