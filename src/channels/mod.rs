//! Messaging collaborators.
//!
//! Everything above this module talks to [`MessageChannel`]; the Discord
//! REST adapter is the production implementation and [`MemoryChannel`]
//! stands in for it in dry runs and tests.

pub mod discord;
pub mod memory;
pub mod traits;

pub use discord::DiscordAdapter;
pub use memory::{ChannelCall, MemoryChannel};
pub use traits::{ChannelError, MessageChannel, MessageTarget};
