//! Resource fetcher: one HTTP request per source key.
//!
//! The fetcher only downloads and classifies. It never retries and never
//! touches persisted state; retry policy belongs to the caller's next tick.

use crate::config::FeedConfig;
use crate::error::{FetchError, Result};
use crate::http::build_client;
use crate::source::SourceKey;
use crate::types::{Document, FetchOutcome};
use crate::{menu, roster};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, trace, warn};
use url::Url;

/// Something that can download a feed document for a [`SourceKey`].
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Download and classify the resource identified by `key`.
    async fn fetch(&self, key: &SourceKey) -> Result<FetchOutcome>;
}

/// [`ResourceFetcher`] backed by the real HTTP feeds.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FeedConfig,
}

impl HttpFetcher {
    /// Create a fetcher for the given feed configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Config`] if the configuration is invalid.
    pub fn new(config: FeedConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config)?;
        Ok(Self { client, config })
    }

    /// Feed configuration in use.
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// URL requested for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Config`] if a configured base URL cannot be
    /// extended with path segments.
    pub fn request_url(&self, key: &SourceKey) -> Result<Url> {
        match key {
            SourceKey::Menu { menu_id, week } => {
                let mut url = parse_url(&self.config.menu_base_url)?;
                url.path_segments_mut()
                    .map_err(|()| FetchError::Config("menu_base_url cannot be a base".into()))?
                    .pop_if_empty()
                    .push(menu_id)
                    .push(&week.week.to_string());
                Ok(url)
            }
            SourceKey::DutyRoster => parse_url(&self.config.roster_url),
            SourceKey::Schedule { class_name } => {
                let mut url = parse_url(&self.config.schedule_url)?;
                url.query_pairs_mut().append_pair("room", class_name);
                Ok(url)
            }
        }
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, key: &SourceKey) -> Result<FetchOutcome> {
        let url = self.request_url(key)?;
        debug!(source = %key, %url, "fetching feed");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            warn!(source = %key, %status, "feed request failed");
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            debug!(source = %key, "feed returned no content");
            return Ok(FetchOutcome::EmptyUpstream);
        }
        trace!(source = %key, body = %body, "feed body");

        let document: Document = serde_json::from_str(&body)
            .map_err(|e| FetchError::Parse(format!("{key}: body is not JSON: {e}")))?;
        classify(key, document)
    }
}

/// Apply per-feed shape checks to a decoded 200 response.
fn classify(key: &SourceKey, document: Document) -> Result<FetchOutcome> {
    match key {
        SourceKey::Menu { .. } => menu::unwrap_envelope(document),
        SourceKey::DutyRoster => {
            roster::parse_roster(&document)?;
            Ok(FetchOutcome::Success(document))
        }
        SourceKey::Schedule { .. } => Ok(FetchOutcome::Success(document)),
    }
}

fn parse_url(value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| FetchError::Config(format!("invalid URL '{value}': {e}")))
}
