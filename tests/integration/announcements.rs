//! Refresh-then-publish cycles against the in-memory channel.

use crate::helpers::{harness, local, menu_document, roster_document, week_42, week_43};
use chrono::Duration;
use ssis_bot::announce::menu_is_available;
use ssis_bot::config::SchedulerConfig;
use ssis_bot::scheduler::{TaskHandler, TaskResult, builtin_tasks};
use ssis_bot::store::{AnnouncementRepository, CacheRepository, Payload};
use ssis_feeds::{FetchError, IsoWeekRef, SourceKey};

#[tokio::test]
async fn weekend_without_menu_publishes_notice() {
    let h = harness();
    // Saturday: the menu shown is next week's, which is not out yet.
    let report = h.assistant.menu_cycle(local(17, 10, 0)).await.unwrap();
    assert!(report.errors.is_empty(), "{report:?}");
    assert_eq!(h.fetcher.calls(), vec![week_43()]);

    let cached = h.assistant.refresher().cached(&week_43()).unwrap();
    assert_eq!(cached.payload, Payload::Empty);
    assert!(!menu_is_available(Some(&cached)));

    let sent = h.channel.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].1.contains("Ingen veckomeny tillgänglig"));
    assert!(sent[1].1.contains("Ingen meny finns tillgänglig."));

    let records = AnnouncementRepository::new(h.store.clone());
    assert!(records.get("weekly-menu").unwrap().message_id.is_some());
    assert!(records.get("daily-menu").unwrap().message_id.is_some());
}

#[tokio::test]
async fn menu_messages_are_edited_then_recreated() {
    let h = harness();
    h.fetcher.set(week_42(), menu_document());
    let records = AnnouncementRepository::new(h.store.clone());

    let t1 = local(15, 9, 0);
    h.assistant.menu_cycle(t1).await.unwrap();
    let first = records.get("weekly-menu").unwrap().message_id.unwrap();
    let weekly = h.channel.content_of("announcements", &first).unwrap();
    assert!(weekly.contains("**🥞 Pancake Thursday** med sylt"));
    assert!(weekly.contains("Fredag"));
    let daily_id = records.get("daily-menu").unwrap().message_id.unwrap();
    let daily = h.channel.content_of("announcements", &daily_id).unwrap();
    assert!(daily.contains("Ärtsoppa"));
    assert!(!daily.contains("Falafel"));

    let t2 = t1 + Duration::minutes(20);
    h.assistant.menu_cycle(t2).await.unwrap();
    assert_eq!(records.get("weekly-menu").unwrap().message_id, Some(first.clone()));
    assert_eq!(h.channel.sent().len(), 2);
    assert_eq!(h.fetcher.calls().len(), 2);

    h.channel.delete_message("announcements", &first);
    let t3 = t2 + Duration::minutes(1);
    h.assistant.menu_cycle(t3).await.unwrap();
    // Within the minimum interval: no download, but the message comes back.
    assert_eq!(h.fetcher.calls().len(), 2);
    let replaced = records.get("weekly-menu").unwrap().message_id.unwrap();
    assert_ne!(replaced, first);
    assert_eq!(h.channel.sent().len(), 3);
    assert!(
        h.channel
            .content_of("announcements", &replaced)
            .unwrap()
            .contains("Meny vecka 42")
    );
}

#[tokio::test]
async fn failed_refresh_keeps_cached_menu() {
    let h = harness();
    h.fetcher.set(week_42(), menu_document());
    let t1 = local(15, 9, 0);
    h.assistant.menu_cycle(t1).await.unwrap();

    h.fetcher.set_outage(Some(FetchError::Status(503)));
    let t2 = t1 + Duration::minutes(30);
    let task = builtin_tasks(&SchedulerConfig::default()).remove(0);
    let result = h.assistant.run(&task, t2).await;
    let TaskResult::Error(summary) = result else {
        unreachable!("expected an error result, got {result:?}");
    };
    assert!(summary.contains("503"), "{summary}");

    let doc = CacheRepository::new(h.store.clone()).load(&week_42());
    assert_eq!(doc.refresh.last_success_at, Some(t1));
    assert_eq!(doc.refresh.last_attempt_at, Some(t2));
    let resource = doc.resource.unwrap();
    assert_eq!(resource.cached_at, t1);
    assert!(resource.payload.document().is_some());

    // The stale copy is still what readers see.
    let records = AnnouncementRepository::new(h.store.clone());
    let daily_id = records.get("daily-menu").unwrap().message_id.unwrap();
    assert!(
        h.channel
            .content_of("announcements", &daily_id)
            .unwrap()
            .contains("Ärtsoppa")
    );
}

#[tokio::test]
async fn roster_cycle_publishes_roster() {
    let h = harness();
    h.fetcher.set(SourceKey::DutyRoster, roster_document());
    let report = h.assistant.roster_cycle(local(16, 7, 0)).await.unwrap();
    assert!(report.errors.is_empty());
    let sent = h.channel.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("**Pentry 1 (Nedre)**: TE20A"));
    assert!(sent[0].1.contains("**Pentry 2**: TE21B (Kim)"));
}

#[tokio::test]
async fn sync_on_demand_uses_cache_only() {
    let h = harness();
    h.fetcher.set(SourceKey::DutyRoster, roster_document());
    h.assistant.roster_cycle(local(16, 7, 0)).await.unwrap();

    h.assistant
        .sync_announcement_at("duty-roster", local(16, 7, 5))
        .await
        .unwrap();
    assert_eq!(h.fetcher.calls().len(), 1);
    assert_eq!(h.channel.sent().len(), 1);
    assert_eq!(h.channel.calls().len(), 2);
}

#[tokio::test]
async fn stale_roster_is_withdrawn_not_relabelled() {
    let h = harness();
    h.fetcher.set(SourceKey::DutyRoster, roster_document());
    h.assistant.roster_cycle(local(12, 8, 0)).await.unwrap();
    let records = AnnouncementRepository::new(h.store.clone());
    let id = records.get("duty-roster").unwrap().message_id.unwrap();
    let fresh = h.channel.content_of("announcements", &id).unwrap();
    assert!(fresh.contains("**Pentry 1 (Nedre)**: TE20A"));
    assert!(fresh.ends_with("Meddelande uppdaterat 2026-10-12 08:00"), "{fresh}");

    // Still fresh a few hours later: the footer keeps the download time.
    h.fetcher.set_outage(Some(FetchError::Status(503)));
    h.assistant.roster_cycle(local(12, 15, 0)).await.unwrap();
    let held = h.channel.content_of("announcements", &id).unwrap();
    assert!(held.ends_with("Meddelande uppdaterat 2026-10-12 08:00"), "{held}");

    // Four days of failures later the old roster is no longer shown.
    let report = h.assistant.roster_cycle(local(16, 8, 0)).await.unwrap();
    assert!(report.errors.iter().any(|e| e.contains("503")), "{report:?}");
    let stale = h.channel.content_of("announcements", &id).unwrap();
    assert!(!stale.contains("TE20A"), "{stale}");
    assert!(stale.contains("Ingen information om pentryansvar"));

    // Subscribers are not sent the old roster either.
    h.assistant
        .ledger()
        .subscribe("pentry", "weekly", "1")
        .unwrap();
    let dispatch = h
        .assistant
        .notify_due_subscribers_at("pentry", "weekly", local(16, 9, 0))
        .await
        .unwrap();
    assert!(dispatch.delivered.is_empty());
    assert!(dispatch.skipped_reason.is_some());
    assert!(h.channel.sent().iter().all(|(target, _)| !matches!(
        target,
        ssis_bot::channels::MessageTarget::User(_)
    )));
}

#[tokio::test]
async fn menu_cycle_drops_menus_older_than_last_week() {
    let h = harness();
    let cache = CacheRepository::new(h.store.clone());
    let week = |week| SourceKey::menu("521", IsoWeekRef { year: 2026, week });

    // Thursdays of weeks 40, 41 and 42.
    h.assistant.menu_cycle(local(1, 9, 0)).await.unwrap();
    h.assistant.menu_cycle(local(8, 9, 0)).await.unwrap();
    assert!(cache.load(&week(40)).source_key.is_some());

    h.assistant.menu_cycle(local(15, 9, 0)).await.unwrap();
    assert_eq!(h.fetcher.calls(), vec![week(40), week(41), week(42)]);
    assert!(cache.load(&week(40)).source_key.is_none());
    assert!(cache.load(&week(41)).refresh.last_attempt_at.is_some());
    assert!(cache.load(&week(42)).refresh.last_attempt_at.is_some());
}
