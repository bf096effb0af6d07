//! Edit-else-recreate: keep one live message per slot.

use crate::channels::{ChannelError, MessageChannel, MessageTarget};
use tracing::{debug, info};

/// Why [`EditElseRecreate::publish`] failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// The platform call failed; the previous message, if any, is intact.
    #[error(transparent)]
    Channel(ChannelError),

    /// The previous message is gone and sending its replacement failed.
    #[error("message {previous} is gone and no replacement was sent: {source}")]
    ReplacementFailed {
        previous: String,
        source: ChannelError,
    },
}

/// What [`EditElseRecreate::publish`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Published {
    /// No previous message; a new one was sent.
    Created { message_id: String },
    /// The previous message was edited in place.
    Edited { message_id: String },
    /// The previous message was gone; a new one replaced it.
    Recreated { previous: String, message_id: String },
}

impl Published {
    /// Id of the message now showing the content.
    pub fn message_id(&self) -> &str {
        match self {
            Self::Created { message_id }
            | Self::Edited { message_id }
            | Self::Recreated { message_id, .. } => message_id,
        }
    }
}

/// Edit the known message; if and only if the platform reports it missing,
/// send a fresh one instead. Any other failure is returned untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditElseRecreate;

impl EditElseRecreate {
    /// # Errors
    ///
    /// Returns [`PublishError::ReplacementFailed`] when the previous message
    /// was gone and the new one could not be sent, otherwise the channel
    /// error of the edit or the send.
    pub async fn publish(
        &self,
        channel: &dyn MessageChannel,
        channel_id: &str,
        message_id: Option<&str>,
        content: &str,
    ) -> Result<Published, PublishError> {
        let target = MessageTarget::Channel(channel_id.to_owned());
        let Some(previous) = message_id else {
            let message_id = channel
                .send_message(&target, content)
                .await
                .map_err(PublishError::Channel)?;
            debug!(channel_id, message_id = %message_id, "announcement created");
            return Ok(Published::Created { message_id });
        };

        match channel.edit_message(channel_id, previous, content).await {
            Ok(()) => Ok(Published::Edited {
                message_id: previous.to_owned(),
            }),
            Err(ChannelError::NotFound) => {
                info!(channel_id, previous, "announcement message gone, sending a new one");
                let message_id = channel.send_message(&target, content).await.map_err(|source| {
                    PublishError::ReplacementFailed {
                        previous: previous.to_owned(),
                        source,
                    }
                })?;
                Ok(Published::Recreated {
                    previous: previous.to_owned(),
                    message_id,
                })
            }
            Err(e) => Err(PublishError::Channel(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::channels::MemoryChannel;

    #[tokio::test]
    async fn creates_without_previous_message() {
        let channel = MemoryChannel::new();
        let published = EditElseRecreate
            .publish(&channel, "c", None, "hej")
            .await
            .unwrap();
        assert!(matches!(published, Published::Created { .. }));
        assert_eq!(channel.content_of("c", published.message_id()).as_deref(), Some("hej"));
    }

    #[tokio::test]
    async fn edits_existing_message() {
        let channel = MemoryChannel::new();
        let first = EditElseRecreate.publish(&channel, "c", None, "a").await.unwrap();
        let second = EditElseRecreate
            .publish(&channel, "c", Some(first.message_id()), "b")
            .await
            .unwrap();
        assert_eq!(
            second,
            Published::Edited {
                message_id: first.message_id().to_owned()
            }
        );
        assert_eq!(channel.content_of("c", first.message_id()).as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn recreates_when_not_found() {
        let channel = MemoryChannel::new();
        let first = EditElseRecreate.publish(&channel, "c", None, "a").await.unwrap();
        channel.delete_message("c", first.message_id());

        let second = EditElseRecreate
            .publish(&channel, "c", Some(first.message_id()), "b")
            .await
            .unwrap();
        match second {
            Published::Recreated {
                previous,
                message_id,
            } => {
                assert_eq!(previous, first.message_id());
                assert_ne!(message_id, previous);
            }
            other => panic!("expected recreate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_errors_do_not_recreate() {
        let channel = MemoryChannel::new();
        let first = EditElseRecreate.publish(&channel, "c", None, "a").await.unwrap();
        channel.set_outage(Some(ChannelError::Api {
            status: 500,
            body: "oops".into(),
        }));

        let err = EditElseRecreate
            .publish(&channel, "c", Some(first.message_id()), "b")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PublishError::Channel(ChannelError::Api { status: 500, .. })
        ));
        channel.set_outage(None);
        assert_eq!(channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn failed_replacement_names_the_lost_message() {
        let channel = MemoryChannel::new();
        let first = EditElseRecreate.publish(&channel, "c", None, "a").await.unwrap();
        channel.delete_message("c", first.message_id());
        channel.set_send_outage(Some(ChannelError::Http("down".into())));

        let err = EditElseRecreate
            .publish(&channel, "c", Some(first.message_id()), "b")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PublishError::ReplacementFailed {
                previous: first.message_id().to_owned(),
                source: ChannelError::Http("down".into()),
            }
        );
    }
}
