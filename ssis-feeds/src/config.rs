//! Feed configuration with sensible defaults.
//!
//! [`FeedConfig`] holds the upstream endpoints and request behaviour. It is
//! embedded as the `[feeds]` table of the bot's TOML configuration.

use crate::error::FetchError;
use serde::{Deserialize, Serialize};

/// Fixed client identifier sent with every feed request.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "ssis-bot/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/sotpotatis/ssisrelateddiscordbot)"
);

/// Configuration for the upstream feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// User-Agent header identifying this client to the feed owners.
    pub user_agent: String,
    /// Base URL of the lunch menu API. `/{menu_id}/{week}` is appended.
    pub menu_base_url: String,
    /// Menu identifier of the restaurant (Eatery Kista Nod is `521`).
    pub menu_id: String,
    /// Duty roster ("pentryansvar") endpoint.
    pub roster_url: String,
    /// Class schedule endpoint. `?room=<class>` is appended.
    pub schedule_url: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            menu_base_url: "https://lunchmeny.albins.website/api".to_owned(),
            menu_id: "521".to_owned(),
            roster_url: "http://192.168.158.116/api/pentryansvar".to_owned(),
            schedule_url: "https://api.ssis.nu/cal".to_owned(),
        }
    }
}

impl FeedConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.timeout_seconds == 0 {
            return Err(FetchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(FetchError::Config("user_agent must not be empty".into()));
        }
        if self.menu_id.trim().is_empty() {
            return Err(FetchError::Config("menu_id must not be empty".into()));
        }
        for (name, value) in [
            ("menu_base_url", &self.menu_base_url),
            ("roster_url", &self.roster_url),
            ("schedule_url", &self.schedule_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| FetchError::Config(format!("{name} is not a valid URL: {e}")))?;
        }
        Ok(())
    }
}
