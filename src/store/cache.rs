//! Cached feed documents and their refresh bookkeeping.
//!
//! One document per source key at `cache/<slug>.json`, holding both the last
//! good payload and the refresh timestamps so a single locked update covers
//! both. Caches are optional: an unreadable file is treated as empty.

use super::document::{DocumentStore, OnCorrupt};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ssis_feeds::{Document, IsoWeekRef, SourceKey};
use tracing::info;
use std::sync::Arc;

/// Cached payload of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "document", rename_all = "snake_case")]
pub enum Payload {
    /// The feed returned a document.
    Data(Document),
    /// The feed said there is nothing for this period.
    Empty,
}

impl Payload {
    pub fn document(&self) -> Option<&Document> {
        match self {
            Self::Data(doc) => Some(doc),
            Self::Empty => None,
        }
    }
}

/// Last successfully downloaded payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResource {
    pub payload: Payload,
    /// When the payload was written to the cache. Never moves backwards.
    pub cached_at: DateTime<Utc>,
    /// When the payload was received from upstream.
    pub downloaded_at: DateTime<Utc>,
}

/// Attempt bookkeeping for the min-interval and max-staleness rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshState {
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
}

/// The persisted `cache/<slug>.json` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheDocument {
    pub source_key: Option<SourceKey>,
    pub resource: Option<CachedResource>,
    pub refresh: RefreshState,
}

/// Typed access to cache documents.
#[derive(Debug, Clone)]
pub struct CacheRepository {
    store: Arc<DocumentStore>,
}

impl CacheRepository {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// Current cache document for `key`; empty if missing or unreadable.
    pub fn load(&self, key: &SourceKey) -> CacheDocument {
        self.store.load_or_default(&key.document_key())
    }

    /// Cached payload for `key`, if any was ever stored.
    pub fn resource(&self, key: &SourceKey) -> Option<CachedResource> {
        self.load(key).resource
    }

    /// Read-modify-write the cache document for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    pub fn update<R>(&self, key: &SourceKey, f: impl FnOnce(&mut CacheDocument) -> R) -> Result<R> {
        self.store
            .update_with(&key.document_key(), OnCorrupt::Reset, |doc: &mut CacheDocument| {
                doc.source_key = Some(key.clone());
                Ok(f(doc))
            })
    }

    /// Delete cached menus of `menu_id` for weeks before `oldest_kept`.
    /// Returns the keys that were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be listed or a
    /// document cannot be deleted.
    pub fn prune_menus(&self, menu_id: &str, oldest_kept: IsoWeekRef) -> Result<Vec<SourceKey>> {
        let mut removed = Vec::new();
        for doc_key in self.store.keys_under("cache")? {
            let doc: CacheDocument = self.store.load_or_default(&doc_key);
            let Some(key) = doc.source_key else {
                continue;
            };
            let outdated = matches!(
                &key,
                SourceKey::Menu { menu_id: id, week } if id == menu_id && *week < oldest_kept
            );
            if !outdated || key.document_key() != doc_key {
                continue;
            }
            if self.store.remove(&doc_key)? {
                removed.push(key);
            }
        }
        if !removed.is_empty() {
            info!(count = removed.len(), %oldest_kept, "pruned old menu caches");
        }
        Ok(removed)
    }
}
