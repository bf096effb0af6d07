//! Background task scheduler.
//!
//! Runs the periodic refresh, announcement and notification cycles. Each
//! task has its own interval and an optional window of local hours.

pub mod runner;
pub mod tasks;

pub use runner::{Scheduler, SchedulerSnapshot, TaskHandler, load_persisted_snapshot};
pub use tasks::{
    Schedule, ScheduledTask, TASK_NOTIFY_SUBSCRIBERS, TASK_REFRESH_DUTY_ROSTER, TASK_REFRESH_MENU,
    TASK_REFRESH_SCHEDULES, TaskResult, TaskRunOutcome, TaskRunRecord, TimeWindow, builtin_tasks,
};
