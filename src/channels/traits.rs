use async_trait::async_trait;
use std::fmt;

/// Where a new message goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageTarget {
    /// A guild text channel, by id.
    Channel(String),
    /// A direct message to a user, by id.
    User(String),
}

impl fmt::Display for MessageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(id) => write!(f, "channel:{id}"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// Errors reported by a messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The message (or channel) no longer exists.
    #[error("message not found")]
    NotFound,

    /// The recipient does not accept messages from the bot.
    #[error("recipient cannot be messaged: {0}")]
    Undeliverable(String),

    /// Transport failure before any answer was received.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The platform rejected the request.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
}

/// Messaging collaborator contract: create and edit plain-text messages.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Stable platform identifier (e.g. `discord`).
    fn id(&self) -> &'static str;

    /// Send a new message and return its id.
    async fn send_message(&self, target: &MessageTarget, content: &str)
    -> Result<String, ChannelError>;

    /// Replace the content of an existing message.
    ///
    /// Returns [`ChannelError::NotFound`] if the message is gone.
    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), ChannelError>;
}
