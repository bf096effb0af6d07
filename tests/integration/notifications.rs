//! Subscription ledger and direct-message delivery, end to end.

use crate::helpers::{config, harness, local, menu_document, open_harness, roster_document, week_42};
use ssis_bot::BotError;
use ssis_bot::channels::{MemoryChannel, MessageTarget};
use ssis_bot::notify::load_schema;
use ssis_bot::store::SubscriptionRepository;
use ssis_feeds::SourceKey;
use std::collections::BTreeSet;

fn direct_messages(channel: &MemoryChannel) -> Vec<(String, String)> {
    channel
        .sent()
        .into_iter()
        .filter_map(|(target, content)| match target {
            MessageTarget::User(user) => Some((user, content)),
            MessageTarget::Channel(_) => None,
        })
        .collect()
}

fn ids(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|id| (*id).to_owned()).collect()
}

#[tokio::test]
async fn daily_menu_is_sent_once_per_day() {
    let h = harness();
    h.fetcher.set(week_42(), menu_document());
    h.assistant.menu_cycle(local(15, 7, 0)).await.unwrap();

    let ledger = h.assistant.ledger();
    assert!(ledger.subscribe("menu", "daily", "1001").unwrap());
    assert_eq!(
        ledger
            .due_subscribers("menu", "daily", local(15, 0, 0))
            .unwrap(),
        ids(&["1001"])
    );

    let report = h
        .assistant
        .notify_due_subscribers_at("menu", "daily", local(15, 8, 5))
        .await
        .unwrap();
    assert_eq!(report.delivered, vec!["1001".to_owned()]);
    let dms = direct_messages(&h.channel);
    assert_eq!(dms.len(), 1);
    assert_eq!(dms[0].0, "1001");
    assert!(dms[0].1.contains("Ärtsoppa"));

    // Same day: nobody is due any more.
    let report = h
        .assistant
        .notify_due_subscribers_at("menu", "daily", local(15, 8, 30))
        .await
        .unwrap();
    assert!(report.delivered.is_empty());
    assert!(report.skipped_reason.is_some());
    assert_eq!(direct_messages(&h.channel).len(), 1);

    // Next day the subscriber is due again and gets Friday's menu.
    h.assistant.menu_cycle(local(16, 7, 0)).await.unwrap();
    assert_eq!(
        ledger
            .due_subscribers("menu", "daily", local(16, 0, 0))
            .unwrap(),
        ids(&["1001"])
    );
    let report = h
        .assistant
        .notify_due_subscribers_at("menu", "daily", local(16, 8, 5))
        .await
        .unwrap();
    assert_eq!(report.delivered, vec!["1001".to_owned()]);
    let dms = direct_messages(&h.channel);
    assert_eq!(dms.len(), 2);
    assert!(dms[1].1.contains("Falafel"));

    let doc = SubscriptionRepository::new(h.store.clone()).load().unwrap();
    let entry = doc.subcategory("menu", "daily").unwrap().subscriptions["1001"];
    assert_eq!(entry.last_notified_at, Some(local(16, 8, 5)));
}

#[tokio::test]
async fn nothing_to_send_leaves_subscribers_due() {
    let h = harness();
    // Saturday: next week's menu is not published, so there is no data.
    h.assistant.menu_cycle(local(17, 9, 0)).await.unwrap();
    h.assistant
        .ledger()
        .subscribe("menu", "daily", "1001")
        .unwrap();

    let report = h
        .assistant
        .notify_due_subscribers_at("menu", "daily", local(17, 9, 5))
        .await
        .unwrap();
    assert!(report.delivered.is_empty());
    assert!(report.failed.is_empty());
    assert!(report.skipped_reason.is_some());
    assert!(direct_messages(&h.channel).is_empty());
    assert_eq!(
        h.assistant
            .ledger()
            .due_subscribers("menu", "daily", local(17, 0, 0))
            .unwrap(),
        ids(&["1001"])
    );
}

#[tokio::test]
async fn failed_delivery_is_retried_without_resending_to_others() {
    let h = harness();
    h.fetcher.set(SourceKey::DutyRoster, roster_document());
    h.assistant.roster_cycle(local(16, 7, 0)).await.unwrap();
    let ledger = h.assistant.ledger();
    for user in ["1", "2", "3"] {
        ledger.subscribe("pentry", "weekly", user).unwrap();
    }
    h.channel.refuse_user("2");

    let report = h
        .assistant
        .notify_due_subscribers_at("pentry", "weekly", local(16, 9, 0))
        .await
        .unwrap();
    assert_eq!(report.delivered, vec!["1".to_owned(), "3".to_owned()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "2");
    assert!(
        direct_messages(&h.channel)
            .iter()
            .all(|(_, content)| content.contains("Pentryansvar"))
    );

    let report = h
        .assistant
        .notify_due_subscribers_at("pentry", "weekly", local(16, 10, 0))
        .await
        .unwrap();
    assert!(report.delivered.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(direct_messages(&h.channel).len(), 2);
    assert_eq!(
        ledger
            .due_subscribers("pentry", "weekly", local(12, 0, 0))
            .unwrap(),
        ids(&["2"])
    );
}

#[tokio::test]
async fn ledger_survives_restart_and_schema_grows() {
    let h = harness();
    h.fetcher.set(SourceKey::DutyRoster, roster_document());
    h.assistant.roster_cycle(local(16, 7, 0)).await.unwrap();
    h.assistant
        .ledger()
        .subscribe("pentry", "weekly", "1")
        .unwrap();
    let report = h
        .assistant
        .notify_due_subscribers_at("pentry", "weekly", local(16, 9, 0))
        .await
        .unwrap();
    assert_eq!(report.delivered.len(), 1);

    let dir = h.dir;
    let schema_path = dir.path().join("available_subscriptions.json");
    std::fs::write(
        &schema_path,
        r#"{"menu": {"subcategories": ["daily", "weekly", "monthly"]}}"#,
    )
    .unwrap();

    let h = open_harness(dir, config());
    let ledger = h.assistant.ledger();
    let added = ledger
        .ensure_schema(&load_schema(&schema_path).unwrap())
        .unwrap();
    assert_eq!(added, 1);
    // Categories missing from the new schema are kept, with their history.
    assert_eq!(
        ledger.subcategories("menu", "").unwrap(),
        vec!["daily".to_owned(), "monthly".to_owned(), "weekly".to_owned()]
    );
    assert!(ledger.is_subscribed("pentry", "weekly", "1").unwrap());

    let report = h
        .assistant
        .notify_due_subscribers_at("pentry", "weekly", local(16, 12, 0))
        .await
        .unwrap();
    assert!(report.delivered.is_empty());
    assert!(direct_messages(&h.channel).is_empty());
}

#[tokio::test]
async fn unknown_subscription_is_rejected() {
    let h = harness();
    let err = h
        .assistant
        .notify_due_subscribers_at("menu", "hourly", local(16, 9, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::SchemaMismatch { .. }), "{err}");
    let err = h
        .assistant
        .ledger()
        .subscribe("sports", "daily", "1")
        .unwrap_err();
    assert!(matches!(err, BotError::SchemaMismatch { .. }), "{err}");
}

#[tokio::test]
async fn corrupt_subscriptions_are_not_overwritten() {
    let h = harness();
    let path = h.store.path_for("subscriptions").unwrap();
    std::fs::write(&path, "{not json").unwrap();

    let ledger = h.assistant.ledger();
    let err = ledger
        .due_subscribers("menu", "daily", local(16, 0, 0))
        .unwrap_err();
    assert!(matches!(err, BotError::StoreCorruption { .. }), "{err}");
    assert!(ledger.subscribe("menu", "daily", "1").is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
}
