//! Tracing subscriber setup for the binary.
//!
//! `RUST_LOG` wins when set. Otherwise `SSIS_BOT_LOG_LEVEL` (or the
//! `logging.level` config value) picks the level for this workspace's
//! crates, while dependencies stay at `warn`.

use crate::config::LoggingConfig;
use crate::error::{BotError, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable overriding `logging.level`.
pub const LOG_LEVEL_ENV: &str = "SSIS_BOT_LOG_LEVEL";

/// Rolling log file name prefix inside the logs directory.
const LOG_FILE_PREFIX: &str = "ssis-bot.log";

/// Map a user-facing level name to a tracing level directive.
///
/// # Errors
///
/// Returns [`BotError::Config`] for anything other than `debug`, `info`,
/// `warning` (or `warn`) and `error`.
pub fn level_directive(level: &str) -> Result<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warning" | "warn" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(BotError::Config(format!(
            "invalid log level '{other}' (expected debug, info, warning or error)"
        ))),
    }
}

/// Filter directive from the three possible sources, highest priority first.
///
/// # Errors
///
/// Returns [`BotError::Config`] for an invalid level name.
pub fn filter_directive(
    rust_log: Option<&str>,
    env_level: Option<&str>,
    config_level: &str,
) -> Result<String> {
    if let Some(rust_log) = rust_log.filter(|v| !v.trim().is_empty()) {
        return Ok(rust_log.to_owned());
    }
    let level = level_directive(env_level.filter(|v| !v.trim().is_empty()).unwrap_or(config_level))?;
    Ok(format!("warn,ssis_bot={level},ssis_feeds={level}"))
}

/// Install the global subscriber: human-readable output on stderr plus,
/// when `config.file` is set, a daily-rolling file in `logs_dir`.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer.
///
/// # Errors
///
/// Returns [`BotError::Config`] for an invalid level or filter, or an I/O
/// error if the logs directory cannot be created.
pub fn init(config: &LoggingConfig, logs_dir: &Path) -> Result<Option<WorkerGuard>> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let env_level = std::env::var(LOG_LEVEL_ENV).ok();
    let directive = filter_directive(rust_log.as_deref(), env_level.as_deref(), &config.level)?;
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| BotError::Config(format!("invalid log filter '{directive}': {e}")))?;

    let (file_layer, guard) = if config.file {
        std::fs::create_dir_all(logs_dir)?;
        let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| BotError::Config(format!("cannot install log subscriber: {e}")))?;
    Ok(guard)
}
