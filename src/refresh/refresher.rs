//! Cache refresher: fetch a source if the policy allows and persist the result.

use super::policy::RefreshPolicy;
use crate::error::Result;
use crate::store::{CacheRepository, CachedResource, Payload};
use chrono::{DateTime, Utc};
use ssis_feeds::{FetchError, FetchOutcome, ResourceFetcher, SourceKey};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one refresh attempt.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// A new payload was cached.
    Refreshed {
        /// The upstream legitimately had nothing for this period.
        empty: bool,
    },
    /// Too soon since the last attempt; the cache was reused unchanged.
    Skipped,
    /// The upstream failed. The previous payload is kept.
    Failed(FetchError),
}

impl RefreshOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed { .. })
    }
}

impl std::fmt::Display for RefreshOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Refreshed { empty: false } => write!(f, "refreshed"),
            Self::Refreshed { empty: true } => write!(f, "refreshed (no data upstream)"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Keeps cached feed documents fresh.
pub struct CacheRefresher {
    fetcher: Arc<dyn ResourceFetcher>,
    cache: CacheRepository,
    policy: RefreshPolicy,
}

impl CacheRefresher {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, cache: CacheRepository, policy: RefreshPolicy) -> Self {
        Self {
            fetcher,
            cache,
            policy,
        }
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    /// Refresh `key` using the wall clock.
    ///
    /// # Errors
    ///
    /// Only store errors are returned; upstream failures are reported as
    /// [`RefreshOutcome::Failed`].
    pub async fn refresh(&self, key: &SourceKey) -> Result<RefreshOutcome> {
        self.refresh_at(key, Utc::now()).await
    }

    /// Refresh `key` as if the current time were `now`.
    ///
    /// The attempt is claimed under the document lock before the download
    /// starts, so two concurrent callers never both fetch inside the minimum
    /// interval. Stored timestamps only ever move forward.
    ///
    /// # Errors
    ///
    /// Only store errors are returned.
    pub async fn refresh_at(&self, key: &SourceKey, now: DateTime<Utc>) -> Result<RefreshOutcome> {
        let policy = self.policy;
        let claimed = self.cache.update(key, |doc| {
            if !policy.should_attempt(&doc.refresh, now) {
                return false;
            }
            doc.refresh.last_attempt_at = Some(latest(doc.refresh.last_attempt_at, now));
            true
        })?;
        if !claimed {
            debug!(source = %key, "refresh skipped, attempted too recently");
            return Ok(RefreshOutcome::Skipped);
        }

        let outcome = match self.fetcher.fetch(key).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(source = %key, error = %e, "refresh failed, keeping cached copy");
                return Ok(RefreshOutcome::Failed(e));
            }
        };

        let empty = matches!(outcome, FetchOutcome::EmptyUpstream);
        let payload = match outcome {
            FetchOutcome::Success(document) => Payload::Data(document),
            FetchOutcome::EmptyUpstream => Payload::Empty,
        };
        self.cache.update(key, |doc| {
            let cached_at = doc
                .resource
                .as_ref()
                .map_or(now, |previous| previous.cached_at.max(now));
            doc.resource = Some(CachedResource {
                payload,
                cached_at,
                downloaded_at: now,
            });
            doc.refresh.last_success_at = Some(latest(doc.refresh.last_success_at, now));
        })?;
        info!(source = %key, empty, "cache refreshed");
        Ok(RefreshOutcome::Refreshed { empty })
    }

    /// Refresh several sources one after another. A failure for one key
    /// does not stop the rest.
    pub async fn refresh_many(
        &self,
        keys: &[SourceKey],
        now: DateTime<Utc>,
    ) -> Vec<(SourceKey, Result<RefreshOutcome>)> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let outcome = self.refresh_at(key, now).await;
            if let Err(e) = &outcome {
                warn!(source = %key, error = %e, "could not update cache document");
            }
            results.push((key.clone(), outcome));
        }
        results
    }

    /// Last cached payload for `key`, however old.
    pub fn cached(&self, key: &SourceKey) -> Option<CachedResource> {
        self.cache.resource(key)
    }

    /// Cached copy of `key`, unless the last success is older than the
    /// staleness ceiling. Anything shown to users goes through this.
    pub fn fresh(&self, key: &SourceKey, now: DateTime<Utc>) -> Option<CachedResource> {
        let fresh = self.policy.fresh_resource(self.cache.load(key), now);
        if fresh.is_none() {
            debug!(source = %key, "no fresh cached copy");
        }
        fresh
    }
}

fn latest(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    previous.map_or(now, |prev| prev.max(now))
}
