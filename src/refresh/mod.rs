//! Cache refresher: per-source download with min-interval and max-staleness
//! rules.
//!
//! A failed refresh never touches the cached payload or the last success
//! time; only the attempt time moves. Callers keep publishing the stale copy
//! and the next scheduler tick retries.

pub mod policy;
pub mod refresher;

pub use policy::RefreshPolicy;
pub use refresher::{CacheRefresher, RefreshOutcome};
