//! The scheduler driving the assistant through a morning.

use crate::helpers::{Harness, harness, local, menu_document, roster_document, stockholm, week_42};
use ssis_bot::channels::MessageTarget;
use ssis_bot::config::SchedulerConfig;
use ssis_bot::scheduler::{
    Scheduler, TASK_NOTIFY_SUBSCRIBERS, TASK_REFRESH_DUTY_ROSTER, TASK_REFRESH_MENU,
    TASK_REFRESH_SCHEDULES, TaskRunOutcome, TaskRunRecord, builtin_tasks,
};
use ssis_feeds::SourceKey;

fn scheduler(h: &Harness) -> Scheduler {
    let mut scheduler = Scheduler::new(h.assistant.clone()).with_store(h.store.clone());
    for task in builtin_tasks(&SchedulerConfig::default()) {
        scheduler.add_task(task);
    }
    scheduler
}

fn task_ids(runs: &[TaskRunRecord]) -> Vec<&str> {
    runs.iter().map(|run| run.task_id.as_str()).collect()
}

#[tokio::test]
async fn notifications_wait_for_the_window() {
    let h = harness();
    h.fetcher.set(week_42(), menu_document());
    h.fetcher.set(SourceKey::DutyRoster, roster_document());
    h.assistant
        .ledger()
        .subscribe("pentry", "weekly", "1")
        .unwrap();
    let mut scheduler = scheduler(&h);

    let runs = scheduler.tick_at(local(16, 7, 0), &stockholm()).await;
    assert_eq!(
        task_ids(&runs),
        vec![TASK_REFRESH_MENU, TASK_REFRESH_SCHEDULES, TASK_REFRESH_DUTY_ROSTER]
    );
    assert!(runs.iter().all(|run| run.outcome == TaskRunOutcome::Success));
    assert!(
        h.channel
            .sent()
            .iter()
            .all(|(target, _)| matches!(target, MessageTarget::Channel(_)))
    );

    let runs = scheduler.tick_at(local(16, 8, 0), &stockholm()).await;
    assert_eq!(
        task_ids(&runs),
        vec![TASK_REFRESH_MENU, TASK_REFRESH_SCHEDULES, TASK_NOTIFY_SUBSCRIBERS]
    );
    let notify = &runs[2];
    assert_eq!(notify.outcome, TaskRunOutcome::Success);
    assert!(notify.summary.contains("pentry/weekly: 1 delivered"), "{}", notify.summary);
    assert!(
        h.channel
            .sent()
            .iter()
            .any(|(target, _)| *target == MessageTarget::User("1".to_owned()))
    );
}

#[tokio::test]
async fn evening_ticks_skip_notifications() {
    let h = harness();
    let mut scheduler = scheduler(&h);
    let runs = scheduler.tick_at(local(16, 19, 0), &stockholm()).await;
    assert!(!task_ids(&runs).contains(&TASK_NOTIFY_SUBSCRIBERS));
    let runs = scheduler.tick_at(local(17, 8, 0), &stockholm()).await;
    assert!(task_ids(&runs).contains(&TASK_NOTIFY_SUBSCRIBERS));
}

#[tokio::test]
async fn restart_resumes_from_persisted_runs() {
    let h = harness();
    let mut first = scheduler(&h);
    let runs = first.tick_at(local(16, 7, 0), &stockholm()).await;
    assert_eq!(runs.len(), 3);
    drop(first);

    let mut second = scheduler(&h);
    second.load_state();
    assert_eq!(second.history().len(), 3);
    let menu = second
        .tasks()
        .iter()
        .find(|task| task.id == TASK_REFRESH_MENU)
        .unwrap();
    assert_eq!(menu.last_run, Some(local(16, 7, 0)));

    // Nothing is due ten minutes later, and notifications are still outside
    // the window.
    let runs = second.tick_at(local(16, 7, 10), &stockholm()).await;
    assert!(runs.is_empty());
}
