//! In-process [`MessageChannel`] that keeps messages in memory.
//!
//! Used for `--dry-run` and in tests. Remote deletions and refusals can be
//! simulated so the edit-else-recreate and delivery-failure paths run
//! without a network.

use crate::channels::traits::{ChannelError, MessageChannel, MessageTarget};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

/// One call observed by a [`MemoryChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCall {
    Send {
        target: MessageTarget,
        content: String,
        message_id: String,
    },
    Edit {
        channel_id: String,
        message_id: String,
        content: String,
    },
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    /// (channel id, message id) -> content
    messages: BTreeMap<(String, String), String>,
    calls: Vec<ChannelCall>,
    refused_users: BTreeSet<String>,
    outage: Option<ChannelError>,
    send_outage: Option<ChannelError>,
}

/// Messaging channel backed by a map.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    state: Mutex<State>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every successful call, in order.
    pub fn calls(&self) -> Vec<ChannelCall> {
        self.state().calls.clone()
    }

    /// Contents of successful sends, in order.
    pub fn sent(&self) -> Vec<(MessageTarget, String)> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                ChannelCall::Send {
                    target, content, ..
                } => Some((target.clone(), content.clone())),
                ChannelCall::Edit { .. } => None,
            })
            .collect()
    }

    /// Current content of a message, if it exists.
    pub fn content_of(&self, channel_id: &str, message_id: &str) -> Option<String> {
        self.state()
            .messages
            .get(&(channel_id.to_owned(), message_id.to_owned()))
            .cloned()
    }

    /// Simulate someone deleting a message on the platform.
    pub fn delete_message(&self, channel_id: &str, message_id: &str) -> bool {
        self.state()
            .messages
            .remove(&(channel_id.to_owned(), message_id.to_owned()))
            .is_some()
    }

    /// Direct messages to `user_id` fail as undeliverable from now on.
    pub fn refuse_user(&self, user_id: impl Into<String>) {
        self.state().refused_users.insert(user_id.into());
    }

    /// Make every call fail with `error` until cleared with `None`.
    pub fn set_outage(&self, error: Option<ChannelError>) {
        self.state().outage = error;
    }

    /// Make sends fail with `error` while edits keep working.
    pub fn set_send_outage(&self, error: Option<ChannelError>) {
        self.state().send_outage = error;
    }
}

/// Channel id used for direct messages to a user.
fn dm_channel_id(user_id: &str) -> String {
    format!("dm-{user_id}")
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    fn id(&self) -> &'static str {
        "memory"
    }

    async fn send_message(
        &self,
        target: &MessageTarget,
        content: &str,
    ) -> Result<String, ChannelError> {
        let mut state = self.state();
        if let Some(error) = state.outage.as_ref().or(state.send_outage.as_ref()) {
            return Err(error.clone());
        }
        let channel_id = match target {
            MessageTarget::Channel(id) => id.clone(),
            MessageTarget::User(id) if state.refused_users.contains(id) => {
                return Err(ChannelError::Undeliverable(format!("user {id}")));
            }
            MessageTarget::User(id) => dm_channel_id(id),
        };
        state.next_id += 1;
        let message_id = state.next_id.to_string();
        state
            .messages
            .insert((channel_id, message_id.clone()), content.to_owned());
        state.calls.push(ChannelCall::Send {
            target: target.clone(),
            content: content.to_owned(),
            message_id: message_id.clone(),
        });
        info!(%target, message_id = %message_id, "message sent\n{content}");
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), ChannelError> {
        let mut state = self.state();
        if let Some(error) = &state.outage {
            return Err(error.clone());
        }
        let Some(existing) = state
            .messages
            .get_mut(&(channel_id.to_owned(), message_id.to_owned()))
        else {
            return Err(ChannelError::NotFound);
        };
        content.clone_into(existing);
        state.calls.push(ChannelCall::Edit {
            channel_id: channel_id.to_owned(),
            message_id: message_id.to_owned(),
            content: content.to_owned(),
        });
        info!(channel_id, message_id, "message edited\n{content}");
        Ok(())
    }
}
