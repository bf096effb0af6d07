//! Read-only view of persisted bot state for the `status` command.

use crate::error::Result;
use crate::scheduler::{SchedulerSnapshot, load_persisted_snapshot};
use crate::store::{AnnouncementRecord, AnnouncementRepository, DocumentStore};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::sync::Arc;

/// Number of recent runs shown.
const RECENT_RUNS: usize = 10;

/// Scheduler tasks, recent runs and announcement records as stored.
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    pub scheduler: SchedulerSnapshot,
    pub announcements: Vec<AnnouncementRecord>,
}

impl StatusReport {
    /// Read the report from `store`. Nothing is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler state is unreadable or the
    /// announcement directory cannot be listed.
    pub fn collect(store: &Arc<DocumentStore>) -> Result<Self> {
        Ok(Self {
            scheduler: load_persisted_snapshot(store)?,
            announcements: AnnouncementRepository::new(Arc::clone(store)).list()?,
        })
    }
}

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(
        || "never".to_owned(),
        |at| at.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tasks:")?;
        if self.scheduler.tasks.is_empty() {
            writeln!(f, "  (none recorded)")?;
        }
        for task in &self.scheduler.tasks {
            let state = if task.enabled { "" } else { " [disabled]" };
            writeln!(
                f,
                "  {}{state}: {}, last run {}",
                task.id,
                task.schedule,
                timestamp(task.last_run)
            )?;
            if let Some(error) = &task.last_error {
                writeln!(f, "    last error: {error}")?;
            }
        }

        let skip = self.scheduler.history.len().saturating_sub(RECENT_RUNS);
        if skip < self.scheduler.history.len() {
            writeln!(f, "recent runs:")?;
        }
        for run in self.scheduler.history.iter().skip(skip) {
            writeln!(
                f,
                "  {} {} {:?}: {}",
                timestamp(Some(run.started_at)),
                run.task_id,
                run.outcome,
                run.summary
            )?;
        }

        writeln!(f, "announcements:")?;
        if self.announcements.is_empty() {
            writeln!(f, "  (none published)")?;
        }
        for record in &self.announcements {
            writeln!(
                f,
                "  {}: channel {}, message {}, sent {}",
                record.key,
                record.channel_id,
                record.message_id.as_deref().unwrap_or("-"),
                timestamp(record.last_sent_at)
            )?;
        }
        Ok(())
    }
}
