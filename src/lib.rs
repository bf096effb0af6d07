//! SSIS bot: the refresh-and-notify core of a school Discord bot.
//!
//! Upstream feeds (lunch menu, duty roster, class schedules) are cached on
//! disk and republished as self-updating announcement messages. Users can
//! opt in to personal direct-message notifications, delivered at most once
//! per subscriber and period.
//!
//! # Architecture
//!
//! - **store**: whole-document JSON files behind typed repositories
//! - **refresh**: per-source cache refresh with min-interval and
//!   max-staleness rules, over [`ssis_feeds::ResourceFetcher`]
//! - **announce**: rendering plus edit-else-recreate publishing
//! - **notify**: the subscription ledger and direct-message dispatch
//! - **scheduler**: the periodic loop driving the cycles
//! - **assistant**: the facade tying the above together
//! - **status**: a read-only summary of persisted state

pub mod announce;
pub mod assistant;
pub mod bot_dirs;
pub mod channels;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod refresh;
pub mod scheduler;
pub mod status;
pub mod store;

pub use assistant::{Assistant, CycleReport};
pub use config::BotConfig;
pub use error::{BotError, Result};
