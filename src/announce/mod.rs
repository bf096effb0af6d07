//! Self-updating announcement messages.
//!
//! Each configured slot (weekly menu, today's menu, duty roster) owns one
//! live message. Syncing renders the slot from its cached source and edits
//! that message, recreating it only when the platform says it is gone.

pub mod policy;
pub mod render;
pub mod synchronizer;

pub use policy::{EditElseRecreate, PublishError, Published};
pub use render::{ContentKind, RenderedMessage, menu_is_available, render, render_at};
pub use synchronizer::{AnnouncementSynchronizer, SyncOutcome};
