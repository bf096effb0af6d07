//! Notification ledger: who is subscribed to what, and when each subscriber
//! was last notified.
//!
//! The set of valid `(category, subcategory)` pairs comes from a static
//! schema file. [`NotificationLedger::ensure_schema`] adds missing pairs to
//! the persisted document and never removes anything.

use crate::error::{BotError, Result};
use crate::store::{SubscriberEntry, SubscriptionRepository, SubscriptionsDocument, load_json_file};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// Subcategories offered under one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCategory {
    pub subcategories: Vec<String>,
}

/// Contents of `available_subscriptions.json`.
///
/// ```json
/// {"menu": {"subcategories": ["daily", "weekly"]}, "pentry": {"subcategories": ["weekly"]}}
/// ```
pub type SubscriptionSchema = BTreeMap<String, SchemaCategory>;

/// Load the subscription schema from `path`.
///
/// # Errors
///
/// Returns an error if the file is missing or not valid JSON.
pub fn load_schema(path: &Path) -> Result<SubscriptionSchema> {
    load_json_file(path)
}

/// Subscription and delivery bookkeeping over [`SubscriptionRepository`].
#[derive(Debug, Clone)]
pub struct NotificationLedger {
    repo: SubscriptionRepository,
}

impl NotificationLedger {
    pub fn new(repo: SubscriptionRepository) -> Self {
        Self { repo }
    }

    /// Add every schema pair missing from the persisted document.
    ///
    /// Returns the number of subcategories that were added. Existing
    /// subscribers and pairs no longer in the schema are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is corrupt or cannot be written.
    pub fn ensure_schema(&self, schema: &SubscriptionSchema) -> Result<usize> {
        let added = self.repo.update(|doc| {
            let mut added = 0;
            for (category, entry) in schema {
                let subs = doc.subscriptions.entry(category.clone()).or_default();
                for sub in &entry.subcategories {
                    if !subs.contains_key(sub) {
                        subs.insert(sub.clone(), Default::default());
                        added += 1;
                    }
                }
            }
            Ok(added)
        })?;
        if added > 0 {
            info!(added, "subscription schema extended");
        }
        Ok(added)
    }

    /// Subscribers of the pair whose last notification is missing or before
    /// `since`.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::SchemaMismatch`] for an unknown pair.
    pub fn due_subscribers(
        &self,
        category: &str,
        subcategory: &str,
        since: DateTime<Utc>,
    ) -> Result<BTreeSet<String>> {
        let doc = self.repo.load()?;
        let entry = doc
            .subcategory(category, subcategory)
            .ok_or_else(|| BotError::schema_mismatch(category, subcategory))?;
        Ok(entry
            .subscriptions
            .iter()
            .filter(|(_, e)| e.last_notified_at.is_none_or(|at| at < since))
            .map(|(id, _)| id.clone())
            .collect())
    }

    /// Mark `subscriber` as notified at `at`.
    ///
    /// Only call this after the platform accepted the message. The stored
    /// time never moves backwards. A subscriber who unsubscribed in the
    /// meantime is not re-added.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::SchemaMismatch`] for an unknown pair, or a store
    /// error.
    pub fn record_delivery(
        &self,
        category: &str,
        subcategory: &str,
        subscriber: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_pair(category, subcategory, |subscriptions| {
            match subscriptions.get_mut(subscriber) {
                Some(entry) => {
                    entry.last_notified_at = Some(entry.last_notified_at.map_or(at, |t| t.max(at)));
                }
                None => debug!(category, subcategory, subscriber, "delivery for departed subscriber"),
            }
            Ok(())
        })
    }

    /// Subscribe `subscriber` to the pair. Returns `false` if already subscribed.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::SchemaMismatch`] for an unknown pair.
    pub fn subscribe(&self, category: &str, subcategory: &str, subscriber: &str) -> Result<bool> {
        self.with_pair(category, subcategory, |subscriptions| {
            if subscriptions.contains_key(subscriber) {
                return Ok(false);
            }
            subscriptions.insert(subscriber.to_owned(), SubscriberEntry::default());
            Ok(true)
        })
    }

    /// Unsubscribe `subscriber` from the pair. Returns `false` if not subscribed.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::SchemaMismatch`] for an unknown pair.
    pub fn unsubscribe(&self, category: &str, subcategory: &str, subscriber: &str) -> Result<bool> {
        self.with_pair(category, subcategory, |subscriptions| {
            Ok(subscriptions.remove(subscriber).is_some())
        })
    }

    /// # Errors
    ///
    /// Returns [`BotError::SchemaMismatch`] for an unknown pair.
    pub fn is_subscribed(&self, category: &str, subcategory: &str, subscriber: &str) -> Result<bool> {
        let doc = self.repo.load()?;
        doc.subcategory(category, subcategory)
            .map(|entry| entry.subscriptions.contains_key(subscriber))
            .ok_or_else(|| BotError::schema_mismatch(category, subcategory))
    }

    /// Whether the pair exists in the persisted document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is corrupt.
    pub fn has_pair(&self, category: &str, subcategory: &str) -> Result<bool> {
        Ok(self.repo.load()?.subcategory(category, subcategory).is_some())
    }

    /// Known categories starting with `prefix`, for autocompletion.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is corrupt.
    pub fn categories(&self, prefix: &str) -> Result<Vec<String>> {
        let doc = self.repo.load()?;
        Ok(doc
            .subscriptions
            .keys()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect())
    }

    /// Subcategories of `category` starting with `prefix`; empty for an
    /// unknown category.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is corrupt.
    pub fn subcategories(&self, category: &str, prefix: &str) -> Result<Vec<String>> {
        let doc = self.repo.load()?;
        Ok(doc
            .subscriptions
            .get(category)
            .map(|subs| {
                subs.keys()
                    .filter(|s| s.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Full document snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is corrupt.
    pub fn snapshot(&self) -> Result<SubscriptionsDocument> {
        self.repo.load()
    }

    fn with_pair<R>(
        &self,
        category: &str,
        subcategory: &str,
        f: impl FnOnce(&mut BTreeMap<String, SubscriberEntry>) -> Result<R>,
    ) -> Result<R> {
        self.repo.update(|doc| {
            let entry = doc
                .subcategory_mut(category, subcategory)
                .ok_or_else(|| BotError::schema_mismatch(category, subcategory))?;
            f(&mut entry.subscriptions)
        })
    }
}
