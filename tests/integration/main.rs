//! Integration test binary: every integration test in one binary, sharing
//! the `helpers` module.

// Allow unwrap/expect in test code
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod helpers;

mod announcements;
mod notifications;
mod scheduler_cycles;
