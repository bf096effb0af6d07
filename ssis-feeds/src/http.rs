//! Shared HTTP client for feed requests.
//!
//! Every request carries the same fixed User-Agent and the configured
//! timeout. Redirects are followed a few hops; nothing is retried here.

use crate::config::FeedConfig;
use crate::error::FetchError;
use std::time::Duration;

/// Build a [`reqwest::Client`] configured for feed downloads.
///
/// # Errors
///
/// Returns [`FetchError::Config`] if the client cannot be constructed.
pub fn build_client(config: &FeedConfig) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(config.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| FetchError::Config(format!("failed to build HTTP client: {e}")))
}
