//! # ssis-feeds
//!
//! Typed downloads of the upstream feeds the SSIS bot publishes from: the
//! cafeteria lunch menu, the kitchenette duty roster and per-class schedules.
//!
//! ## Design
//!
//! - One request per [`SourceKey`], no internal retries
//! - A 200 answer with no content is a valid [`FetchOutcome::EmptyUpstream`],
//!   not a failure
//! - Every other problem is a [`FetchError`]; the caller decides whether to
//!   keep a stale copy
//! - Nothing here touches persisted state
//!
//! ## Example
//!
//! ```no_run
//! # async fn example() -> ssis_feeds::Result<()> {
//! use ssis_feeds::{FeedConfig, HttpFetcher, ResourceFetcher, SourceKey};
//!
//! let fetcher = HttpFetcher::new(FeedConfig::default())?;
//! let outcome = fetcher.fetch(&SourceKey::DutyRoster).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod menu;
pub mod roster;
pub mod source;
pub mod types;

pub use config::{FeedConfig, DEFAULT_USER_AGENT};
pub use error::{FetchError, Result};
pub use fetcher::{HttpFetcher, ResourceFetcher};
pub use menu::{MenuDay, MenuWeek};
pub use roster::{parse_roster, DutyRosterEntry};
pub use source::{active_classes, menu_week_for, IsoWeekRef, SourceKey};
pub use types::{Document, FetchOutcome};
