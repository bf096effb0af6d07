//! Error types for the ssis-bot core.

use crate::channels::ChannelError;
use ssis_feeds::FetchError;

/// Top-level error type for the refresh-and-notify core.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Persisted store error (bad key, serialization, lock poisoning).
    #[error("store error: {0}")]
    Store(String),

    /// A persisted document exists but cannot be read back.
    #[error("corrupt document '{key}': {reason}")]
    StoreCorruption {
        /// Document key or file path.
        key: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Upstream feed error.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Messaging platform error.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// A subscription category/subcategory pair that the schema does not know.
    #[error("unknown subscription '{category}/{subcategory}'")]
    SchemaMismatch {
        /// Category name.
        category: String,
        /// Subcategory name.
        subcategory: String,
    },

    /// No announcement slot with this key is configured.
    #[error("unknown announcement '{0}'")]
    UnknownAnnouncement(String),

    /// No feed source matches this name.
    #[error("unknown source '{0}'")]
    UnknownSource(String),

    /// Scheduler error (task execution, state persistence).
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BotError {
    /// Shorthand for [`BotError::SchemaMismatch`].
    pub fn schema_mismatch(category: impl Into<String>, subcategory: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            category: category.into(),
            subcategory: subcategory.into(),
        }
    }

    /// Shorthand for [`BotError::StoreCorruption`].
    pub fn corruption(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::StoreCorruption {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BotError>;
