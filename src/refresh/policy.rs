//! When a source may be downloaded again.

use crate::config::RefreshConfig;
use crate::store::{CacheDocument, CachedResource, RefreshState};
use chrono::{DateTime, Duration, Utc};

/// Minimum spacing between attempts plus a staleness ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Attempts closer together than this are skipped.
    pub min_interval: Duration,
    /// A last success older than this forces an attempt regardless of
    /// `min_interval`.
    pub max_staleness: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::from(&RefreshConfig::default())
    }
}

impl From<&RefreshConfig> for RefreshPolicy {
    fn from(config: &RefreshConfig) -> Self {
        Self {
            min_interval: config.min_interval(),
            max_staleness: config.max_staleness(),
        }
    }
}

impl RefreshPolicy {
    /// Whether a download should be attempted at `now`.
    ///
    /// A source that never succeeded is only held back by `min_interval`,
    /// so an upstream that is down from the start is not polled every tick.
    pub fn should_attempt(&self, state: &RefreshState, now: DateTime<Utc>) -> bool {
        if self.is_stale(state, now) && state.last_success_at.is_some() {
            return true;
        }
        match state.last_attempt_at {
            None => true,
            Some(last) => now - last >= self.min_interval,
        }
    }

    /// `true` when there is no success, or the last one is older than
    /// `max_staleness`.
    pub fn is_stale(&self, state: &RefreshState, now: DateTime<Utc>) -> bool {
        match state.last_success_at {
            None => true,
            Some(last) => now - last > self.max_staleness,
        }
    }

    /// The cached resource of `doc`, or `None` once it is stale at `now`.
    pub fn fresh_resource(&self, doc: CacheDocument, now: DateTime<Utc>) -> Option<CachedResource> {
        if self.is_stale(&doc.refresh, now) {
            return None;
        }
        doc.resource
    }
}
