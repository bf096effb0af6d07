//! The assistant: wires the refresher, synchronizer and dispatcher together
//! and exposes the periodic cycles and their on-demand counterparts.
//!
//! Every operation here is safe to call at any time. The refresher's
//! attempt claim and the synchronizer's in-flight lock make a manual call
//! racing a scheduled one harmless.

use crate::announce::{AnnouncementSynchronizer, ContentKind, SyncOutcome, render_at};
use crate::channels::MessageChannel;
use crate::config::{AnnouncementSlot, BotConfig};
use crate::error::{BotError, Result};
use crate::notify::{DispatchReport, NotificationDispatcher, NotificationLedger};
use crate::refresh::{CacheRefresher, RefreshOutcome, RefreshPolicy};
use crate::scheduler::{
    ScheduledTask, TASK_NOTIFY_SUBSCRIBERS, TASK_REFRESH_DUTY_ROSTER, TASK_REFRESH_MENU,
    TASK_REFRESH_SCHEDULES, TaskHandler, TaskResult,
};
use crate::store::{AnnouncementRepository, CacheRepository, DocumentStore, SubscriptionRepository};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use ssis_feeds::{ResourceFetcher, SourceKey, active_classes, menu_week_for};
use std::sync::Arc;
use tracing::{info, warn};

/// What one cycle did, folded into a scheduler result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// One line per step that did something.
    pub done: Vec<String>,
    /// One line per step that failed.
    pub errors: Vec<String>,
}

impl CycleReport {
    fn into_task_result(self) -> TaskResult {
        if !self.errors.is_empty() {
            let mut lines = self.errors;
            lines.extend(self.done);
            return TaskResult::Error(lines.join("; "));
        }
        if self.done.is_empty() {
            return TaskResult::Skipped("nothing to do".to_owned());
        }
        TaskResult::Success(self.done.join("; "))
    }
}

/// Refresh-and-notify core behind the scheduler and the CLI.
pub struct Assistant<Tz: TimeZone = Local> {
    config: Arc<BotConfig>,
    tz: Tz,
    cache: CacheRepository,
    refresher: CacheRefresher,
    synchronizer: AnnouncementSynchronizer,
    dispatcher: NotificationDispatcher,
}

impl Assistant<Local> {
    /// Assistant working in the process's local time zone.
    pub fn new(
        config: Arc<BotConfig>,
        store: Arc<DocumentStore>,
        fetcher: Arc<dyn ResourceFetcher>,
        channel: Arc<dyn MessageChannel>,
    ) -> Self {
        Self::with_timezone(config, store, fetcher, channel, Local)
    }
}

impl<Tz: TimeZone> Assistant<Tz> {
    pub fn with_timezone(
        config: Arc<BotConfig>,
        store: Arc<DocumentStore>,
        fetcher: Arc<dyn ResourceFetcher>,
        channel: Arc<dyn MessageChannel>,
        tz: Tz,
    ) -> Self {
        let cache = CacheRepository::new(Arc::clone(&store));
        let policy = RefreshPolicy::from(&config.refresh);
        let refresher = CacheRefresher::new(fetcher, cache.clone(), policy);
        let synchronizer = AnnouncementSynchronizer::new(
            Arc::clone(&channel),
            AnnouncementRepository::new(Arc::clone(&store)),
        )
        .with_skip_unchanged(config.announcements.skip_unchanged);
        let dispatcher = NotificationDispatcher::new(
            NotificationLedger::new(SubscriptionRepository::new(store)),
            channel,
            cache.clone(),
            config.notifications.clone(),
            config.feeds.menu_id.clone(),
        )
        .with_refresh_policy(policy);
        Self {
            config,
            tz,
            cache,
            refresher,
            synchronizer,
            dispatcher,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn ledger(&self) -> &NotificationLedger {
        self.dispatcher.ledger()
    }

    pub fn refresher(&self) -> &CacheRefresher {
        &self.refresher
    }

    /// Turn a CLI source name into a key. `menu` means the menu shown at
    /// `now`; anything else must be a full key such as `schedule:TE20A`.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::UnknownSource`] for an unparseable name.
    pub fn resolve_source(&self, name: &str, now: DateTime<Utc>) -> Result<SourceKey> {
        if name.trim() == "menu" {
            return Ok(self.menu_key(self.local_date(now)));
        }
        name.parse()
            .map_err(|e: ssis_feeds::FetchError| BotError::UnknownSource(e.to_string()))
    }

    /// Refresh one source now, subject to the refresh policy.
    ///
    /// # Errors
    ///
    /// Returns a store error; upstream failures are in the outcome.
    pub async fn refresh_now(&self, source: &SourceKey) -> Result<RefreshOutcome> {
        self.refresher.refresh(source).await
    }

    /// Re-render and publish one announcement slot now.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::UnknownAnnouncement`] if no slot has that key.
    pub async fn sync_announcement_now(&self, key: &str) -> Result<SyncOutcome> {
        self.sync_announcement_at(key, Utc::now()).await
    }

    /// # Errors
    ///
    /// See [`sync_announcement_now`](Self::sync_announcement_now).
    pub async fn sync_announcement_at(&self, key: &str, now: DateTime<Utc>) -> Result<SyncOutcome> {
        let slot = self
            .config
            .announcements
            .slot(key)
            .ok_or_else(|| BotError::UnknownAnnouncement(key.to_owned()))?;
        self.sync_slot(slot, now).await
    }

    /// Deliver one subscription's content to everyone due now.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::SchemaMismatch`] for an unknown pair.
    pub async fn notify_due_subscribers(
        &self,
        category: &str,
        subcategory: &str,
    ) -> Result<DispatchReport> {
        self.notify_due_subscribers_at(category, subcategory, Utc::now())
            .await
    }

    /// # Errors
    ///
    /// See [`notify_due_subscribers`](Self::notify_due_subscribers).
    pub async fn notify_due_subscribers_at(
        &self,
        category: &str,
        subcategory: &str,
        now: DateTime<Utc>,
    ) -> Result<DispatchReport> {
        self.dispatcher
            .notify_due_subscribers_at(category, subcategory, now, &self.tz)
            .await
    }

    /// Refresh this week's menu (next week's on weekends) and republish
    /// every menu slot, also when the refresh failed. Cached menus older
    /// than the week before the shown one are deleted.
    ///
    /// # Errors
    ///
    /// Returns a store error from the refresh claim.
    pub async fn menu_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let week = menu_week_for(self.local_date(now));
        let menu_id = &self.config.feeds.menu_id;
        let report = self
            .refresh_and_publish(
                SourceKey::menu(menu_id.clone(), week),
                &[ContentKind::WeeklyMenu, ContentKind::DailyMenu],
                now,
            )
            .await?;
        if let Err(e) = self.cache.prune_menus(menu_id, week.previous()) {
            warn!(error = %e, "could not prune old menu caches");
        }
        Ok(report)
    }

    /// Refresh the duty roster and republish its slots.
    ///
    /// # Errors
    ///
    /// Returns a store error from the refresh claim.
    pub async fn roster_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        self.refresh_and_publish(SourceKey::DutyRoster, &[ContentKind::DutyRoster], now)
            .await
    }

    /// Refresh the schedule of every active class.
    pub async fn schedules_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        let keys: Vec<SourceKey> = active_classes(self.local_date(now))
            .into_iter()
            .map(SourceKey::schedule)
            .collect();
        let mut report = CycleReport::default();
        for (key, outcome) in self.refresher.refresh_many(&keys, now).await {
            match outcome {
                Ok(RefreshOutcome::Skipped) => {}
                Ok(RefreshOutcome::Failed(e)) => report.errors.push(format!("{key}: {e}")),
                Ok(outcome) => report.done.push(format!("{key}: {outcome}")),
                Err(e) => report.errors.push(format!("{key}: {e}")),
            }
        }
        report
    }

    /// Run every configured notification rule.
    pub async fn notify_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();
        for rule in &self.config.notifications.rules {
            let pair = format!("{}/{}", rule.category, rule.subcategory);
            match self
                .notify_due_subscribers_at(&rule.category, &rule.subcategory, now)
                .await
            {
                Ok(dispatch) => {
                    if !dispatch.delivered.is_empty() {
                        report
                            .done
                            .push(format!("{pair}: {} delivered", dispatch.delivered.len()));
                    }
                    if !dispatch.failed.is_empty() {
                        report
                            .errors
                            .push(format!("{pair}: {} not delivered", dispatch.failed.len()));
                    }
                }
                Err(e) => {
                    warn!(pair, error = %e, "notification rule failed");
                    report.errors.push(format!("{pair}: {e}"));
                }
            }
        }
        report
    }

    async fn refresh_and_publish(
        &self,
        key: SourceKey,
        kinds: &[ContentKind],
        now: DateTime<Utc>,
    ) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        match self.refresher.refresh_at(&key, now).await? {
            RefreshOutcome::Skipped => {}
            RefreshOutcome::Failed(e) => report.errors.push(format!("{key}: {e}")),
            outcome => report.done.push(format!("{key}: {outcome}")),
        }

        for slot in self.config.announcements.slots_for(kinds) {
            match self.sync_slot(slot, now).await {
                Ok(SyncOutcome::Unchanged) => {}
                Ok(outcome) => report.done.push(format!("{}: {outcome:?}", slot.key)),
                Err(e) => {
                    warn!(slot = %slot.key, error = %e, "announcement not synchronized");
                    report.errors.push(format!("{}: {e}", slot.key));
                }
            }
        }
        Ok(report)
    }

    async fn sync_slot(&self, slot: &AnnouncementSlot, now: DateTime<Utc>) -> Result<SyncOutcome> {
        let key = slot.content.source_key(&self.config.feeds.menu_id, self.local_date(now));
        let cached = self.refresher.fresh(&key, now);
        let rendered = render_at(slot.content, cached.as_ref(), now, &self.tz);
        if !rendered.has_data {
            info!(slot = %slot.key, source = %key, "publishing no-data notice");
        }
        self.synchronizer
            .sync_announcement_at(slot, &rendered, now)
            .await
    }

    fn menu_key(&self, today: NaiveDate) -> SourceKey {
        SourceKey::menu(self.config.feeds.menu_id.clone(), menu_week_for(today))
    }

    fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }
}

#[async_trait]
impl<Tz> TaskHandler for Assistant<Tz>
where
    Tz: TimeZone + Send + Sync + 'static,
    Tz::Offset: Send + Sync,
{
    async fn run(&self, task: &ScheduledTask, now: DateTime<Utc>) -> TaskResult {
        let report = match task.id.as_str() {
            TASK_REFRESH_MENU => self.menu_cycle(now).await,
            TASK_REFRESH_DUTY_ROSTER => self.roster_cycle(now).await,
            TASK_REFRESH_SCHEDULES => Ok(self.schedules_cycle(now).await),
            TASK_NOTIFY_SUBSCRIBERS => Ok(self.notify_cycle(now).await),
            other => return TaskResult::Error(format!("unknown task: {other}")),
        };
        match report {
            Ok(report) => report.into_task_result(),
            Err(e) => TaskResult::Error(e.to_string()),
        }
    }
}
