//! Error types for the ssis-feeds crate.
//!
//! Every variant is an upstream failure from the caller's point of view:
//! the cache layer treats them alike (keep the stale copy, retry on the
//! next tick). They are kept apart so logs say what actually went wrong.

/// Errors that can occur while downloading a feed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The feed answered with a non-200 status code.
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    /// The request did not complete within the configured timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection, TLS or body-read failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The feed answered 200 but the body was not the expected document.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid feed configuration (bad base URL, zero timeout, ...).
    #[error("config error: {0}")]
    Config(String),
}

impl FetchError {
    /// HTTP status code, if the upstream answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Convenience type alias for ssis-feeds results.
pub type Result<T> = std::result::Result<T, FetchError>;
