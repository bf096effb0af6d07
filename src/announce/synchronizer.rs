//! Announcement synchronizer: make a slot's live message show the latest
//! rendering, recording where it lives.

use super::policy::{EditElseRecreate, PublishError, Published};
use super::render::RenderedMessage;
use crate::channels::MessageChannel;
use crate::config::AnnouncementSlot;
use crate::error::Result;
use crate::store::AnnouncementRepository;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of one synchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// First publication of the slot.
    Created { message_id: String },
    /// The existing message was edited.
    Edited { message_id: String },
    /// The existing message was gone and was replaced.
    Recreated { previous: String, message_id: String },
    /// The body was unchanged and no remote call was made.
    Unchanged,
}

impl From<Published> for SyncOutcome {
    fn from(published: Published) -> Self {
        match published {
            Published::Created { message_id } => Self::Created { message_id },
            Published::Edited { message_id } => Self::Edited { message_id },
            Published::Recreated {
                previous,
                message_id,
            } => Self::Recreated {
                previous,
                message_id,
            },
        }
    }
}

/// Keeps announcement messages in step with their rendered content.
pub struct AnnouncementSynchronizer {
    channel: Arc<dyn MessageChannel>,
    records: AnnouncementRepository,
    policy: EditElseRecreate,
    skip_unchanged: bool,
    /// Serializes syncs so one slot is never created twice.
    in_flight: Mutex<()>,
}

impl AnnouncementSynchronizer {
    pub fn new(channel: Arc<dyn MessageChannel>, records: AnnouncementRepository) -> Self {
        Self {
            channel,
            records,
            policy: EditElseRecreate,
            skip_unchanged: false,
            in_flight: Mutex::new(()),
        }
    }

    /// Skip the remote call when the body hash matches the last one sent.
    #[must_use]
    pub fn with_skip_unchanged(mut self, skip_unchanged: bool) -> Self {
        self.skip_unchanged = skip_unchanged;
        self
    }

    /// Publish `rendered` into `slot` using the wall clock.
    ///
    /// # Errors
    ///
    /// See [`sync_announcement_at`](Self::sync_announcement_at).
    pub async fn sync_announcement(
        &self,
        slot: &AnnouncementSlot,
        rendered: &RenderedMessage,
    ) -> Result<SyncOutcome> {
        self.sync_announcement_at(slot, rendered, Utc::now()).await
    }

    /// Publish `rendered` into `slot`.
    ///
    /// The record is only written after the platform confirmed the message,
    /// so a failed call leaves it as it was. The one exception is a message
    /// that turned out to be deleted and could not be replaced: its id is
    /// dropped from the record so the next sync creates a new message.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BotError::Channel`] for any platform failure other
    /// than a vanished message, or a store error.
    pub async fn sync_announcement_at(
        &self,
        slot: &AnnouncementSlot,
        rendered: &RenderedMessage,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome> {
        let _in_flight = self.in_flight.lock().await;

        let record = self.records.get(&slot.key);
        // A message in another channel cannot be edited into this one.
        let message_id = record
            .as_ref()
            .filter(|r| r.channel_id == slot.channel_id)
            .and_then(|r| r.message_id.clone());
        let hash = rendered.content_hash();

        if self.skip_unchanged
            && message_id.is_some()
            && record
                .as_ref()
                .and_then(|r| r.last_rendered_content_hash.as_deref())
                == Some(hash.as_str())
        {
            debug!(slot = %slot.key, "announcement unchanged, skipping");
            return Ok(SyncOutcome::Unchanged);
        }

        let published = match self
            .policy
            .publish(
                self.channel.as_ref(),
                &slot.channel_id,
                message_id.as_deref(),
                &rendered.full_text(),
            )
            .await
        {
            Ok(published) => published,
            Err(PublishError::ReplacementFailed { previous, source }) => {
                warn!(slot = %slot.key, previous = %previous, error = %source, "announcement lost and not replaced");
                self.records.update(&slot.key, |record| {
                    record.message_id = None;
                    record.last_rendered_content_hash = None;
                    Ok(())
                })?;
                return Err(source.into());
            }
            Err(PublishError::Channel(e)) => return Err(e.into()),
        };

        self.records.update(&slot.key, |record| {
            record.channel_id.clone_from(&slot.channel_id);
            record.message_id = Some(published.message_id().to_owned());
            record.last_rendered_at = Some(now);
            record.last_rendered_content_hash = Some(hash);
            record.last_sent_at = Some(now);
            Ok(())
        })?;

        let outcome = SyncOutcome::from(published);
        info!(slot = %slot.key, ?outcome, "announcement synchronized");
        Ok(outcome)
    }
}
