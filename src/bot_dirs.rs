//! Centralized directory paths for the bot.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! | Purpose | Linux default |
//! |---------|---------------|
//! | Persisted documents, logs | `~/.local/share/ssis-bot/` |
//! | Config | `~/.config/ssis-bot/` |
//! | Static data (subscription schema) | `~/.config/ssis-bot/static/` |
//!
//! # Environment Overrides
//!
//! - `SSIS_BOT_DATA_DIR` overrides [`data_dir`]
//! - `SSIS_BOT_CONFIG_DIR` overrides [`config_dir`]
//! - `SSIS_BOT_STATIC_DIR` overrides [`static_dir`]

use std::path::PathBuf;

const APP_DIR: &str = "ssis-bot";

/// Root of the persisted store (`cache/`, `announcements/`,
/// `subscriptions.json`, `scheduler.json`) and the `logs/` directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("SSIS_BOT_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/ssis-bot-data"))
}

/// Directory holding `config.toml`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("SSIS_BOT_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/ssis-bot-config"))
}

/// Read-only static data shipped with the deployment.
#[must_use]
pub fn static_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("SSIS_BOT_STATIC_DIR") {
        return PathBuf::from(override_dir);
    }
    config_dir().join("static")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Subscription schema path (`static_dir()/available_subscriptions.json`).
#[must_use]
pub fn subscription_schema_file() -> PathBuf {
    static_dir().join("available_subscriptions.json")
}
