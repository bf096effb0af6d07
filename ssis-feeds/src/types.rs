//! Core types shared across the crate.

use serde::{Deserialize, Serialize};

/// An opaque feed document, stored as-is by the cache layer.
pub type Document = serde_json::Value;

/// Successful classification of a feed response.
///
/// Upstream failures are reported as [`crate::FetchError`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "document", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// The feed returned a document.
    Success(Document),
    /// The feed answered 200 with no content: nothing is scheduled for the
    /// requested period. This is a valid answer, not a failure.
    EmptyUpstream,
}

impl FetchOutcome {
    /// The document, if any.
    pub fn document(&self) -> Option<&Document> {
        match self {
            Self::Success(doc) => Some(doc),
            Self::EmptyUpstream => None,
        }
    }
}
