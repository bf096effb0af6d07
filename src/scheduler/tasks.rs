//! Scheduled task definitions and the built-in task set.
//!
//! Defines the [`ScheduledTask`] type, the [`Schedule`] enum for timing, and
//! the optional local-hours [`TimeWindow`] a task is restricted to.

use crate::config::SchedulerConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known id of the menu refresh and announcement task.
pub const TASK_REFRESH_MENU: &str = "refresh-menu";
/// Well-known id of the per-class schedule refresh task.
pub const TASK_REFRESH_SCHEDULES: &str = "refresh-schedules";
/// Well-known id of the duty roster refresh and announcement task.
pub const TASK_REFRESH_DUTY_ROSTER: &str = "refresh-duty-roster";
/// Well-known id of the personal notification task.
pub const TASK_NOTIFY_SUBSCRIBERS: &str = "notify-subscribers";

/// How often a task should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    /// Run every N seconds.
    Interval {
        /// Interval in seconds between runs.
        secs: u64,
    },
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interval { secs } => {
                if *secs >= 3600 && secs % 3600 == 0 {
                    write!(f, "every {} hours", secs / 3600)
                } else {
                    write!(f, "every {} minutes", secs / 60)
                }
            }
        }
    }
}

/// Local hours a task may run in, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl TimeWindow {
    /// # Errors
    ///
    /// Returns a description of the problem for hours outside 0-23 or a
    /// window that ends before it starts.
    pub fn validate(&self) -> Result<(), String> {
        if self.start_hour > 23 || self.end_hour > 23 {
            return Err(format!(
                "hours must be 0-23, got {}-{}",
                self.start_hour, self.end_hour
            ));
        }
        if self.end_hour < self.start_hour {
            return Err(format!(
                "window ends ({}) before it starts ({})",
                self.end_hour, self.start_hour
            ));
        }
        Ok(())
    }

    pub fn contains(&self, hour: u32) -> bool {
        (self.start_hour..=self.end_hour).contains(&hour)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00-{:02}:59", self.start_hour, self.end_hour)
    }
}

/// Outcome of executing a scheduled task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    /// Task completed successfully with a summary message.
    Success(String),
    /// Task ran but had nothing to do.
    Skipped(String),
    /// Task failed with an error message.
    Error(String),
}

impl TaskResult {
    pub fn outcome(&self) -> TaskRunOutcome {
        match self {
            Self::Success(_) => TaskRunOutcome::Success,
            Self::Skipped(_) => TaskRunOutcome::Skipped,
            Self::Error(_) => TaskRunOutcome::Error,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Self::Success(s) | Self::Skipped(s) | Self::Error(s) => s.clone(),
        }
    }
}

/// Persisted outcome of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRunOutcome {
    Success,
    Skipped,
    Error,
}

/// One entry of the scheduler run history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRunRecord {
    pub task_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: TaskRunOutcome,
    pub summary: String,
}

/// A task that runs on a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Unique task identifier (e.g. `"refresh-menu"`).
    pub id: String,
    /// Human-readable task name.
    pub name: String,
    /// When to run this task.
    pub schedule: Schedule,
    /// Local hours the task is restricted to, if any.
    #[serde(default)]
    pub window: Option<TimeWindow>,
    /// Start of the last run, if any.
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    /// Error of the last run, cleared by a successful one.
    #[serde(default)]
    pub last_error: Option<String>,
    /// Whether the task is enabled.
    pub enabled: bool,
}

impl ScheduledTask {
    /// Create a new enabled task with the given schedule.
    pub fn new(id: impl Into<String>, name: impl Into<String>, schedule: Schedule) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            schedule,
            window: None,
            last_run: None,
            last_error: None,
            enabled: true,
        }
    }

    #[must_use]
    pub fn with_window(mut self, window: Option<TimeWindow>) -> Self {
        self.window = window;
        self
    }

    /// Returns `true` if the task is enabled, inside its window at
    /// `local_hour`, and its interval has elapsed at `now`.
    pub fn is_due_at(&self, now: DateTime<Utc>, local_hour: u32) -> bool {
        if !self.enabled {
            return false;
        }
        if self.window.is_some_and(|w| !w.contains(local_hour)) {
            return false;
        }
        match &self.schedule {
            Schedule::Interval { secs } => match self.last_run {
                None => true,
                Some(last) => now.signed_duration_since(last).num_seconds() >= *secs as i64,
            },
        }
    }

    /// Record a run that started at `at`.
    pub fn mark_run(&mut self, at: DateTime<Utc>, result: &TaskResult) {
        self.last_run = Some(at);
        self.last_error = match result {
            TaskResult::Error(e) => Some(e.clone()),
            _ => None,
        };
    }
}

/// The four built-in tasks with intervals and window from `config`.
pub fn builtin_tasks(config: &SchedulerConfig) -> Vec<ScheduledTask> {
    vec![
        ScheduledTask::new(
            TASK_REFRESH_MENU,
            "Refresh menu and menu announcements",
            Schedule::Interval {
                secs: config.menu_refresh_secs,
            },
        ),
        ScheduledTask::new(
            TASK_REFRESH_SCHEDULES,
            "Refresh class schedules",
            Schedule::Interval {
                secs: config.schedule_refresh_secs,
            },
        ),
        ScheduledTask::new(
            TASK_REFRESH_DUTY_ROSTER,
            "Refresh duty roster and its announcement",
            Schedule::Interval {
                secs: config.roster_refresh_secs,
            },
        ),
        ScheduledTask::new(
            TASK_NOTIFY_SUBSCRIBERS,
            "Notify due subscribers",
            Schedule::Interval {
                secs: config.notify_secs,
            },
        )
        .with_window(config.notify_window),
    ]
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 10, 0, 0).unwrap()
    }

    fn hourly() -> ScheduledTask {
        ScheduledTask::new("t", "Test", Schedule::Interval { secs: 3600 })
    }

    #[test]
    fn new_task_has_correct_defaults() {
        let task = hourly();
        assert!(task.enabled);
        assert!(task.last_run.is_none());
        assert!(task.window.is_none());
    }

    #[test]
    fn is_due_when_never_run() {
        assert!(hourly().is_due_at(now(), 10));
    }

    #[test]
    fn interval_governs_reruns() {
        let mut task = hourly();
        task.mark_run(now(), &TaskResult::Success("ok".into()));
        assert!(!task.is_due_at(now() + Duration::minutes(59), 10));
        assert!(task.is_due_at(now() + Duration::minutes(60), 11));
    }

    #[test]
    fn is_due_false_when_disabled() {
        let mut task = hourly();
        task.enabled = false;
        assert!(!task.is_due_at(now(), 10));
    }

    #[test]
    fn window_is_inclusive() {
        let task = hourly().with_window(Some(TimeWindow {
            start_hour: 8,
            end_hour: 18,
        }));
        assert!(!task.is_due_at(now(), 7));
        assert!(task.is_due_at(now(), 8));
        assert!(task.is_due_at(now(), 18));
        assert!(!task.is_due_at(now(), 19));
    }

    #[test]
    fn window_validation() {
        assert!(TimeWindow { start_hour: 8, end_hour: 18 }.validate().is_ok());
        assert!(TimeWindow { start_hour: 18, end_hour: 8 }.validate().is_err());
        assert!(TimeWindow { start_hour: 0, end_hour: 24 }.validate().is_err());
    }

    #[test]
    fn error_is_kept_until_success() {
        let mut task = hourly();
        task.mark_run(now(), &TaskResult::Error("down".into()));
        assert_eq!(task.last_error.as_deref(), Some("down"));
        task.mark_run(now(), &TaskResult::Skipped("nothing".into()));
        assert!(task.last_error.is_none());
    }

    #[test]
    fn schedule_serde_uses_type_tag() {
        let json = serde_json::to_value(Schedule::Interval { secs: 900 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "interval", "secs": 900}));
    }

    #[test]
    fn schedule_display() {
        assert_eq!(Schedule::Interval { secs: 21600 }.to_string(), "every 6 hours");
        assert_eq!(Schedule::Interval { secs: 900 }.to_string(), "every 15 minutes");
    }

    #[test]
    fn builtins_follow_config() {
        let config = SchedulerConfig::default();
        let tasks = builtin_tasks(&config);
        let ids: Vec<_> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                TASK_REFRESH_MENU,
                TASK_REFRESH_SCHEDULES,
                TASK_REFRESH_DUTY_ROSTER,
                TASK_NOTIFY_SUBSCRIBERS
            ]
        );
        assert_eq!(tasks[0].schedule, Schedule::Interval { secs: 900 });
        assert_eq!(tasks[3].window, config.notify_window);
        assert!(tasks[..3].iter().all(|t| t.window.is_none()));
    }
}
