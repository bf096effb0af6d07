//! Scheduler background loop.
//!
//! Spawns a tokio task that periodically checks for due tasks and hands
//! them to a [`TaskHandler`]. Task state and run history are persisted to
//! `scheduler.json` in the document store, so a restart picks up where the
//! previous process left off.

use crate::error::{BotError, Result};
use crate::scheduler::tasks::{ScheduledTask, TaskResult, TaskRunRecord};
use crate::store::DocumentStore;
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default interval between scheduler ticks (seconds).
const TICK_INTERVAL_SECS: u64 = 60;

/// Number of run-history entries to keep.
const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Store key of the persisted scheduler state.
const STATE_KEY: &str = "scheduler";

/// Runs a due task.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Execute `task`. Failures are reported in the result, never panicked.
    async fn run(&self, task: &ScheduledTask, now: DateTime<Utc>) -> TaskResult;
}

/// Public snapshot of tasks and recent runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    /// Persisted tasks.
    pub tasks: Vec<ScheduledTask>,
    /// Recent run history.
    #[serde(default)]
    pub history: Vec<TaskRunRecord>,
}

/// Persisted scheduler state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SchedulerState {
    /// Schema version.
    #[serde(default = "default_state_version")]
    version: u8,
    #[serde(default)]
    tasks: Vec<ScheduledTask>,
    #[serde(default)]
    history: Vec<TaskRunRecord>,
}

fn default_state_version() -> u8 {
    1
}

/// Background scheduler that runs periodic tasks.
pub struct Scheduler {
    /// Registered tasks.
    tasks: Vec<ScheduledTask>,
    /// Recent run history.
    history: Vec<TaskRunRecord>,
    /// Where state is persisted; `None` keeps it in memory only.
    store: Option<Arc<DocumentStore>>,
    handler: Arc<dyn TaskHandler>,
    /// Optional listener for finished runs.
    result_tx: Option<mpsc::UnboundedSender<TaskRunRecord>>,
    tick_interval: Duration,
    /// Max history entries kept in memory and persisted to disk.
    max_history_entries: usize,
}

impl Scheduler {
    /// Create a scheduler that hands due tasks to `handler`.
    pub fn new(handler: Arc<dyn TaskHandler>) -> Self {
        Self {
            tasks: Vec::new(),
            history: Vec::new(),
            store: None,
            handler,
            result_tx: None,
            tick_interval: Duration::from_secs(TICK_INTERVAL_SECS),
            max_history_entries: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Persist task state and history in `store`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Forward every finished run to `tx`.
    #[must_use]
    pub fn with_results(mut self, tx: mpsc::UnboundedSender<TaskRunRecord>) -> Self {
        self.result_tx = Some(tx);
        self
    }

    #[must_use]
    pub fn with_tick_interval(mut self, secs: u64) -> Self {
        self.tick_interval = Duration::from_secs(secs.max(1));
        self
    }

    /// Override the in-memory and persisted run-history limit.
    #[must_use]
    pub fn with_history_limit(mut self, max_entries: usize) -> Self {
        self.max_history_entries = max_entries.max(1);
        self
    }

    /// Add (or replace) a task.
    pub fn add_task(&mut self, task: ScheduledTask) {
        if let Some(existing) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            *existing = task;
        } else {
            self.tasks.push(task);
        }
    }

    /// Returns registered tasks.
    pub fn tasks(&self) -> &[ScheduledTask] {
        &self.tasks
    }

    /// Returns scheduler run history.
    pub fn history(&self) -> &[TaskRunRecord] {
        &self.history
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            tasks: self.tasks.clone(),
            history: self.history.clone(),
        }
    }

    /// Load persisted state and merge it into the registered tasks.
    ///
    /// Schedules and windows come from the registered definitions; only the
    /// runtime fields (`last_run`, `last_error`, `enabled`) are restored.
    /// Persisted tasks that are no longer registered are dropped.
    pub fn load_state(&mut self) {
        let Some(store) = &self.store else {
            return;
        };
        let snapshot = match load_snapshot(store) {
            Ok(s) => s,
            Err(e) => {
                warn!("cannot load scheduler state: {e}");
                return;
            }
        };

        for saved in snapshot.tasks {
            match self.tasks.iter_mut().find(|t| t.id == saved.id) {
                Some(task) => {
                    task.last_run = saved.last_run;
                    task.last_error = saved.last_error;
                    task.enabled = saved.enabled;
                }
                None => debug!(task = %saved.id, "dropping persisted task that is no longer registered"),
            }
        }

        self.history = snapshot.history;
        self.trim_history();
        debug!("loaded scheduler state");
    }

    /// Persist task state and run history.
    fn save_state(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = save_snapshot(store, &self.snapshot()) {
            error!("cannot persist scheduler state: {e}");
        }
    }

    /// Start the scheduler background loop. Cancelling `cancel` stops it
    /// after the current tick.
    pub fn run(mut self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        self.load_state();

        tokio::spawn(async move {
            info!("scheduler started with {} tasks", self.tasks.len());
            let mut interval = tokio::time::interval(self.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                self.tick_at(Utc::now(), &Local).await;
            }
            info!("scheduler stopped");
        })
    }

    /// Execute one scheduler tick: run every task due at `now`, with
    /// windows evaluated in `tz`. Returns the runs that happened.
    pub async fn tick_at<Tz: TimeZone>(&mut self, now: DateTime<Utc>, tz: &Tz) -> Vec<TaskRunRecord> {
        let local_hour = now.with_timezone(tz).hour();
        let due_ids: Vec<String> = self
            .tasks
            .iter()
            .filter(|t| t.is_due_at(now, local_hour))
            .map(|t| t.id.clone())
            .collect();

        let mut runs = Vec::with_capacity(due_ids.len());
        for task_id in due_ids {
            let Some(task_snapshot) = self.tasks.iter().find(|t| t.id == task_id).cloned() else {
                continue;
            };

            debug!("executing scheduled task: {}", task_snapshot.id);
            let clock = Instant::now();
            let result = self.handler.run(&task_snapshot, now).await;
            let finished_at = now + chrono::Duration::from_std(clock.elapsed()).unwrap_or_default();

            match &result {
                TaskResult::Error(e) => warn!(task = %task_id, error = %e, "scheduled task failed"),
                other => debug!(task = %task_id, summary = %other.summary(), "scheduled task finished"),
            }
            if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) {
                task.mark_run(now, &result);
            }

            let record = TaskRunRecord {
                task_id: task_snapshot.id.clone(),
                started_at: now,
                finished_at,
                outcome: result.outcome(),
                summary: result.summary(),
            };
            self.push_history(record.clone());
            let closed = match &self.result_tx {
                Some(tx) => tx.send(record.clone()).is_err(),
                None => false,
            };
            if closed {
                debug!("scheduler result channel closed");
                self.result_tx = None;
            }
            runs.push(record);
        }

        if !runs.is_empty() {
            self.save_state();
        }
        runs
    }

    fn push_history(&mut self, run: TaskRunRecord) {
        self.history.push(run);
        self.trim_history();
    }

    fn trim_history(&mut self) {
        if self.history.len() <= self.max_history_entries {
            return;
        }
        let drop_count = self.history.len().saturating_sub(self.max_history_entries);
        self.history.drain(0..drop_count);
    }
}

fn load_snapshot(store: &DocumentStore) -> Result<SchedulerSnapshot> {
    let state: SchedulerState = store
        .load(STATE_KEY)
        .map_err(|e| BotError::Scheduler(format!("cannot read state: {e}")))?
        .unwrap_or_default();
    Ok(SchedulerSnapshot {
        tasks: state.tasks,
        history: state.history,
    })
}

fn save_snapshot(store: &DocumentStore, snapshot: &SchedulerSnapshot) -> Result<()> {
    let state = SchedulerState {
        version: default_state_version(),
        tasks: snapshot.tasks.clone(),
        history: snapshot.history.clone(),
    };
    store
        .save(STATE_KEY, &state)
        .map_err(|e| BotError::Scheduler(format!("cannot write state: {e}")))
}

/// Load the persisted scheduler snapshot from `store`.
///
/// # Errors
///
/// Returns [`BotError::Scheduler`] if the state file is unreadable.
pub fn load_persisted_snapshot(store: &DocumentStore) -> Result<SchedulerSnapshot> {
    load_snapshot(store)
}
