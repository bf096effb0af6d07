use crate::channels::traits::{ChannelError, MessageChannel, MessageTarget};
use crate::config::DiscordConfig;
use crate::error::BotError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Discord rejects message content longer than this (in characters).
const MAX_CONTENT_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

/// Discord messaging over the REST API.
pub struct DiscordAdapter {
    bot_token: String,
    api_base: String,
    client: reqwest::Client,
    /// user id -> DM channel id
    dm_channels: Mutex<HashMap<String, String>>,
}

impl DiscordAdapter {
    /// Build an adapter with an explicit token.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Config`] if the token is empty or the HTTP client
    /// cannot be built.
    pub fn new(config: &DiscordConfig, bot_token: impl Into<String>) -> crate::error::Result<Self> {
        let bot_token = bot_token.into();
        if bot_token.trim().is_empty() {
            return Err(BotError::Config("discord bot token is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(ssis_feeds::DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| BotError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            bot_token,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            client,
            dm_channels: Mutex::new(HashMap::new()),
        })
    }

    /// Build an adapter with the token from the environment or config.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Config`] if no token is available.
    pub fn from_config(config: &DiscordConfig) -> crate::error::Result<Self> {
        Self::new(config, config.resolve_token()?)
    }

    async fn post_message(&self, channel_id: &str, content: &str) -> Result<String, ChannelError> {
        let url = format!("{}/channels/{channel_id}/messages", self.api_base);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&json!({ "content": clamp_content(content) }))
            .send()
            .await
            .map_err(|e| ChannelError::Http(e.to_string()))?;
        let created: Created = read_json(response).await?;
        Ok(created.id)
    }

    async fn dm_channel(&self, user_id: &str) -> Result<String, ChannelError> {
        let cached = self
            .dm_channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned();
        if let Some(id) = cached {
            return Ok(id);
        }

        let url = format!("{}/users/@me/channels", self.api_base);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&json!({ "recipient_id": user_id }))
            .send()
            .await
            .map_err(|e| ChannelError::Http(e.to_string()))?;
        let channel: Created = read_json(response).await?;
        debug!(user_id, channel_id = %channel.id, "opened DM channel");
        self.dm_channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.to_owned(), channel.id.clone());
        Ok(channel.id)
    }
}

#[async_trait]
impl MessageChannel for DiscordAdapter {
    fn id(&self) -> &'static str {
        "discord"
    }

    async fn send_message(
        &self,
        target: &MessageTarget,
        content: &str,
    ) -> Result<String, ChannelError> {
        match target {
            MessageTarget::Channel(channel_id) => self.post_message(channel_id, content).await,
            MessageTarget::User(user_id) => {
                let channel_id = self.dm_channel(user_id).await.map_err(|e| dm_error(user_id, e))?;
                self.post_message(&channel_id, content)
                    .await
                    .map_err(|e| dm_error(user_id, e))
            }
        }
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), ChannelError> {
        let url = format!(
            "{}/channels/{channel_id}/messages/{message_id}",
            self.api_base
        );
        let response = self
            .client
            .patch(&url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&json!({ "content": clamp_content(content) }))
            .send()
            .await
            .map_err(|e| ChannelError::Http(e.to_string()))?;
        check_status(response).await.map(|_| ())
    }
}

/// A DM the platform refuses (blocked bot, DMs disabled) is undeliverable,
/// not a missing message.
fn dm_error(user_id: &str, error: ChannelError) -> ChannelError {
    match error {
        ChannelError::Api { status: 403, .. } | ChannelError::NotFound => {
            ChannelError::Undeliverable(format!("user {user_id}"))
        }
        other => other,
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ChannelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ChannelError::NotFound);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(%status, body = %body, "discord request rejected");
    Err(ChannelError::Api {
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ChannelError> {
    check_status(response)
        .await?
        .json()
        .await
        .map_err(|e| ChannelError::Http(format!("unexpected response body: {e}")))
}

fn clamp_content(content: &str) -> String {
    if content.chars().count() <= MAX_CONTENT_CHARS {
        return content.to_owned();
    }
    let mut clamped: String = content.chars().take(MAX_CONTENT_CHARS - 1).collect();
    clamped.push('…');
    clamped
}
