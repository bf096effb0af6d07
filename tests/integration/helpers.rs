//! Shared helpers for integration tests.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde_json::json;
use ssis_bot::announce::ContentKind;
use ssis_bot::channels::MemoryChannel;
use ssis_bot::config::AnnouncementSlot;
use ssis_bot::notify::SubscriptionSchema;
use ssis_bot::store::DocumentStore;
use ssis_bot::{Assistant, BotConfig};
use ssis_feeds::{Document, FetchError, FetchOutcome, IsoWeekRef, ResourceFetcher, SourceKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Fetcher answering from a table. Unknown keys are `EmptyUpstream`.
#[derive(Default)]
pub(crate) struct FakeFetcher {
    responses: Mutex<HashMap<SourceKey, FetchOutcome>>,
    outage: Mutex<Option<FetchError>>,
    calls: Mutex<Vec<SourceKey>>,
}

impl FakeFetcher {
    pub(crate) fn set(&self, key: SourceKey, document: Document) {
        self.responses
            .lock()
            .unwrap()
            .insert(key, FetchOutcome::Success(document));
    }

    /// Fail every fetch with `error` until cleared with `None`.
    pub(crate) fn set_outage(&self, error: Option<FetchError>) {
        *self.outage.lock().unwrap() = error;
    }

    pub(crate) fn calls(&self) -> Vec<SourceKey> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceFetcher for FakeFetcher {
    async fn fetch(&self, key: &SourceKey) -> ssis_feeds::Result<FetchOutcome> {
        self.calls.lock().unwrap().push(key.clone());
        if let Some(error) = self.outage.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or(FetchOutcome::EmptyUpstream))
    }
}

/// A fully wired assistant over a temp store, an in-memory channel and a
/// fake fetcher, running at UTC+2.
pub(crate) struct Harness {
    pub(crate) dir: tempfile::TempDir,
    pub(crate) store: Arc<DocumentStore>,
    pub(crate) channel: Arc<MemoryChannel>,
    pub(crate) fetcher: Arc<FakeFetcher>,
    pub(crate) assistant: Arc<Assistant<FixedOffset>>,
}

pub(crate) fn stockholm() -> FixedOffset {
    FixedOffset::east_opt(2 * 3600).unwrap()
}

/// `2026-10-<day> hour:min` in the harness time zone, as UTC.
pub(crate) fn local(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    stockholm()
        .with_ymd_and_hms(2026, 10, day, hour, min, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub(crate) fn schema() -> SubscriptionSchema {
    serde_json::from_value(json!({
        "menu": {"subcategories": ["daily", "weekly"]},
        "pentry": {"subcategories": ["weekly"]}
    }))
    .unwrap()
}

pub(crate) fn config() -> BotConfig {
    let mut config = BotConfig::default();
    config.announcements.slots = vec![
        slot("weekly-menu", ContentKind::WeeklyMenu),
        slot("daily-menu", ContentKind::DailyMenu),
        slot("duty-roster", ContentKind::DutyRoster),
    ];
    config
}

fn slot(key: &str, content: ContentKind) -> AnnouncementSlot {
    AnnouncementSlot {
        key: key.to_owned(),
        channel_id: "announcements".to_owned(),
        content,
    }
}

pub(crate) fn harness() -> Harness {
    harness_with(config())
}

pub(crate) fn harness_with(config: BotConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    open_harness(dir, config)
}

/// Build a harness over an existing data directory, as after a restart.
pub(crate) fn open_harness(dir: tempfile::TempDir, config: BotConfig) -> Harness {
    let store = Arc::new(DocumentStore::open(dir.path()).unwrap());
    let channel = Arc::new(MemoryChannel::new());
    let fetcher = Arc::new(FakeFetcher::default());
    let assistant = Arc::new(Assistant::with_timezone(
        Arc::new(config),
        Arc::clone(&store),
        fetcher.clone(),
        channel.clone(),
        stockholm(),
    ));
    assistant.ledger().ensure_schema(&schema()).unwrap();
    Harness {
        dir,
        store,
        channel,
        fetcher,
        assistant,
    }
}

/// Menu key of ISO week 42 of 2026 (12-18 October).
pub(crate) fn week_42() -> SourceKey {
    SourceKey::menu("521", IsoWeekRef { year: 2026, week: 42 })
}

/// Menu key of ISO week 43 of 2026 (19-25 October).
pub(crate) fn week_43() -> SourceKey {
    SourceKey::menu("521", IsoWeekRef { year: 2026, week: 43 })
}

pub(crate) fn menu_document() -> Document {
    json!({
        "title": "Meny vecka 42",
        "week_number": 42,
        "days": {
            "thursday": {
                "day_name": {"swedish": "Torsdag"},
                "dishes": ["Pancake Thursday med sylt", "Ärtsoppa"],
                "special_features": {"pancake_thursday": true}
            },
            "friday": {
                "day_name": {"swedish": "Fredag"},
                "dishes": ["Burger Friday", "Falafel"],
                "special_features": {"burger_friday": true}
            }
        }
    })
}

pub(crate) fn roster_document() -> Document {
    json!({"pentryansvar": [
        {"pentryNumber": 1, "pentryName": "Nedre", "responsibleClass": "TE20A"},
        {"pentryNumber": 2, "responsibleClass": "TE21B", "responsiblePersons": ["Kim"]}
    ]})
}
