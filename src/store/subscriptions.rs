//! The subscriptions document.
//!
//! ```json
//! {"subscriptions": {"menu": {"daily": {"subscriptions": {"1234": {"last_notified_at": null}}}}}}
//! ```
//!
//! Subscriber data is irreplaceable, so an unreadable document is an error,
//! never silently reset.

use super::document::{DocumentStore, OnCorrupt};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

const KEY: &str = "subscriptions";

/// Per-subscriber ledger entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberEntry {
    pub last_notified_at: Option<DateTime<Utc>>,
}

/// Subscribers of one subcategory, keyed by subscriber id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubcategoryEntry {
    pub subscriptions: BTreeMap<String, SubscriberEntry>,
}

/// Root of `subscriptions.json`: category -> subcategory -> subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionsDocument {
    pub subscriptions: BTreeMap<String, BTreeMap<String, SubcategoryEntry>>,
}

impl SubscriptionsDocument {
    pub fn subcategory(&self, category: &str, subcategory: &str) -> Option<&SubcategoryEntry> {
        self.subscriptions.get(category)?.get(subcategory)
    }

    pub fn subcategory_mut(
        &mut self,
        category: &str,
        subcategory: &str,
    ) -> Option<&mut SubcategoryEntry> {
        self.subscriptions.get_mut(category)?.get_mut(subcategory)
    }
}

/// Typed access to `subscriptions.json`.
#[derive(Debug, Clone)]
pub struct SubscriptionRepository {
    store: Arc<DocumentStore>,
}

impl SubscriptionRepository {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// Current document; empty if it was never written.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BotError::StoreCorruption`] if the file is unreadable.
    pub fn load(&self) -> Result<SubscriptionsDocument> {
        Ok(self.store.load(KEY)?.unwrap_or_default())
    }

    /// Read-modify-write the document. Nothing is written if `f` fails.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, a corruption error, or a write error.
    pub fn update<R>(
        &self,
        f: impl FnOnce(&mut SubscriptionsDocument) -> Result<R>,
    ) -> Result<R> {
        self.store.update_with(KEY, OnCorrupt::Fail, f)
    }
}
