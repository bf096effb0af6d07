//! Deliver due notifications as direct messages.

use super::ledger::NotificationLedger;
use crate::announce::render_at;
use crate::channels::{MessageChannel, MessageTarget};
use crate::config::NotificationsConfig;
use crate::error::{BotError, Result};
use crate::refresh::RefreshPolicy;
use crate::store::CacheRepository;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What one dispatch run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Subscribers who received the message and were recorded.
    pub delivered: Vec<String>,
    /// Subscribers whose delivery failed, with the reason.
    pub failed: Vec<(String, String)>,
    /// Set when nothing was attempted.
    pub skipped_reason: Option<String>,
}

impl DispatchReport {
    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            skipped_reason: Some(reason.into()),
            ..Self::default()
        }
    }
}

/// Sends one subscription's content to everyone due for it.
pub struct NotificationDispatcher {
    ledger: NotificationLedger,
    channel: Arc<dyn MessageChannel>,
    cache: CacheRepository,
    rules: NotificationsConfig,
    menu_id: String,
    freshness: RefreshPolicy,
}

impl NotificationDispatcher {
    pub fn new(
        ledger: NotificationLedger,
        channel: Arc<dyn MessageChannel>,
        cache: CacheRepository,
        rules: NotificationsConfig,
        menu_id: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            channel,
            cache,
            rules,
            menu_id: menu_id.into(),
            freshness: RefreshPolicy::default(),
        }
    }

    /// Staleness ceiling for cached content. Older copies are not sent.
    #[must_use]
    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.freshness = policy;
        self
    }

    pub fn ledger(&self) -> &NotificationLedger {
        &self.ledger
    }

    pub fn rules(&self) -> &NotificationsConfig {
        &self.rules
    }

    /// Notify every subscriber of the pair who has not been notified in the
    /// current period, rendering from the cache as of `now` in `tz`.
    ///
    /// Each delivery is independent: one refused direct message does not
    /// stop the rest, and only confirmed deliveries are recorded. A
    /// "nothing available" rendering is never sent, and neither is a cached
    /// copy past the staleness ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::SchemaMismatch`] for an unknown pair,
    /// [`BotError::Config`] if the pair has no notification rule, or a store
    /// error while reading the ledger.
    pub async fn notify_due_subscribers_at<Tz: TimeZone>(
        &self,
        category: &str,
        subcategory: &str,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> Result<DispatchReport> {
        if !self.ledger.has_pair(category, subcategory)? {
            return Err(BotError::schema_mismatch(category, subcategory));
        }
        let rule = self.rules.rule(category, subcategory).ok_or_else(|| {
            BotError::Config(format!("no notification rule for {category}/{subcategory}"))
        })?;
        let since = rule.period.period_start(now, tz);
        let due = self.ledger.due_subscribers(category, subcategory, since)?;
        if due.is_empty() {
            debug!(category, subcategory, "no subscribers due");
            return Ok(DispatchReport::skipped("no subscribers due"));
        }

        let today = now.with_timezone(tz).date_naive();
        let key = rule.content.source_key(&self.menu_id, today);
        let cached = self.freshness.fresh_resource(self.cache.load(&key), now);
        let rendered = render_at(rule.content, cached.as_ref(), now, tz);
        if !rendered.has_data {
            info!(category, subcategory, source = %key, "nothing to deliver");
            return Ok(DispatchReport::skipped(format!("no data for {key}")));
        }

        let text = rendered.full_text();
        let mut report = DispatchReport::default();
        for subscriber in due {
            let target = MessageTarget::User(subscriber.clone());
            match self.channel.send_message(&target, &text).await {
                Ok(_) => {
                    if let Err(e) =
                        self.ledger
                            .record_delivery(category, subcategory, &subscriber, now)
                    {
                        // Delivered but not recorded: it will be sent again next run.
                        error!(subscriber, error = %e, "failed to record delivery");
                        report.failed.push((subscriber, e.to_string()));
                        continue;
                    }
                    report.delivered.push(subscriber);
                }
                Err(e) => {
                    warn!(category, subcategory, subscriber, error = %e, "notification not delivered");
                    report.failed.push((subscriber, e.to_string()));
                }
            }
        }
        info!(
            category,
            subcategory,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "notifications dispatched"
        );
        Ok(report)
    }
}
