//! Persisted store: whole-document JSON files behind typed repositories.
//!
//! Layout under the data directory:
//!
//! | Key | Contents |
//! |-----|----------|
//! | `cache/<source>.json` | last good feed payload + refresh timestamps |
//! | `announcements/<slot>.json` | message currently showing a slot |
//! | `subscriptions.json` | notification ledger |
//! | `scheduler.json` | scheduler task state and run history |

pub mod announcements;
pub mod cache;
pub mod document;
pub mod subscriptions;

pub use announcements::{AnnouncementRecord, AnnouncementRepository};
pub use cache::{CacheDocument, CacheRepository, CachedResource, Payload, RefreshState};
pub use document::{DocumentStore, OnCorrupt, load_json_file};
pub use subscriptions::{
    SubcategoryEntry, SubscriberEntry, SubscriptionRepository, SubscriptionsDocument,
};
