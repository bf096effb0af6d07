//! Configuration for the bot.
//!
//! Loaded once at startup from `config.toml` and shared by reference. Every
//! section has defaults, so an empty file is a valid configuration.

use crate::announce::ContentKind;
use crate::bot_dirs;
use crate::error::{BotError, Result};
use crate::notify::NotificationPeriod;
use crate::scheduler::TimeWindow;
use serde::{Deserialize, Serialize};
use ssis_feeds::FeedConfig;
use std::path::{Path, PathBuf};

/// Environment variable holding the Discord bot token.
pub const TOKEN_ENV: &str = "SSIS_BOT_TOKEN";

/// Longest interval accepted anywhere in the configuration (30 days).
const MAX_INTERVAL_SECS: u64 = 30 * 24 * 3600;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Where persisted documents and static data live.
    pub storage: StorageConfig,
    /// Upstream feed endpoints.
    pub feeds: FeedConfig,
    /// Cache refresh policy.
    pub refresh: RefreshConfig,
    /// Self-updating announcement messages.
    pub announcements: AnnouncementConfig,
    /// Periodic task intervals.
    pub scheduler: SchedulerConfig,
    /// Discord REST settings.
    pub discord: DiscordConfig,
    /// Per-subscription delivery rules.
    pub notifications: NotificationsConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Storage locations. `None` means the platform default from [`bot_dirs`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: Option<PathBuf>,
    pub subscription_schema: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolved store root.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(bot_dirs::data_dir)
    }

    /// Resolved subscription schema path.
    pub fn subscription_schema(&self) -> PathBuf {
        self.subscription_schema
            .clone()
            .unwrap_or_else(bot_dirs::subscription_schema_file)
    }

    /// Log file directory, `logs/` under the store root.
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}

/// Cache refresh policy shared by every source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Minimum spacing between two download attempts of the same source.
    pub min_interval_secs: u64,
    /// A cache older than this is refreshed even inside `min_interval_secs`.
    pub max_staleness_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 15 * 60,
            max_staleness_secs: 12 * 3600,
        }
    }
}

impl RefreshConfig {
    pub fn min_interval(&self) -> chrono::Duration {
        seconds(self.min_interval_secs)
    }

    pub fn max_staleness(&self) -> chrono::Duration {
        seconds(self.max_staleness_secs)
    }
}

/// Announcement slots and sync policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnouncementConfig {
    /// Skip the remote edit when the rendered body has not changed.
    ///
    /// Off by default so the "updated at" footer stays current.
    pub skip_unchanged: bool,
    /// Configured message slots.
    pub slots: Vec<AnnouncementSlot>,
}

impl AnnouncementConfig {
    /// Slot with the given key.
    pub fn slot(&self, key: &str) -> Option<&AnnouncementSlot> {
        self.slots.iter().find(|slot| slot.key == key)
    }

    /// Slots publishing any of `kinds`.
    pub fn slots_for<'a>(
        &'a self,
        kinds: &'a [ContentKind],
    ) -> impl Iterator<Item = &'a AnnouncementSlot> + 'a {
        self.slots.iter().filter(move |slot| kinds.contains(&slot.content))
    }
}

/// One persistent announcement message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementSlot {
    /// Stable slot key, e.g. `weekly-menu`.
    pub key: String,
    /// Channel the message lives in.
    pub channel_id: String,
    /// What the message shows.
    pub content: ContentKind,
}

/// Intervals of the built-in periodic tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How often the scheduler checks for due tasks.
    pub tick_secs: u64,
    pub menu_refresh_secs: u64,
    pub schedule_refresh_secs: u64,
    pub roster_refresh_secs: u64,
    pub notify_secs: u64,
    /// Local hours during which personal notifications may be sent.
    pub notify_window: Option<TimeWindow>,
    /// Number of run records kept in `scheduler.json`.
    pub history_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 60,
            menu_refresh_secs: 15 * 60,
            schedule_refresh_secs: 30 * 60,
            roster_refresh_secs: 6 * 3600,
            notify_secs: 3600,
            notify_window: Some(TimeWindow {
                start_hour: 8,
                end_hour: 18,
            }),
            history_limit: 200,
        }
    }
}

/// Discord REST API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// REST base URL, without trailing slash.
    pub api_base: String,
    /// Bot token. Prefer the `SSIS_BOT_TOKEN` environment variable.
    pub token: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            api_base: "https://discord.com/api/v10".to_owned(),
            token: None,
            timeout_seconds: 10,
        }
    }
}

impl DiscordConfig {
    /// Token from the environment, falling back to the config file.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Config`] if neither is set.
    pub fn resolve_token(&self) -> Result<String> {
        std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.token.clone().filter(|t| !t.trim().is_empty()))
            .ok_or_else(|| {
                BotError::Config(format!(
                    "no Discord token: set {TOKEN_ENV} or discord.token in config.toml"
                ))
            })
    }
}

/// Personal notification rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub rules: Vec<NotificationRule>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                NotificationRule::new("menu", "daily", NotificationPeriod::Daily, ContentKind::DailyMenu),
                NotificationRule::new("menu", "weekly", NotificationPeriod::Weekly, ContentKind::WeeklyMenu),
                NotificationRule::new("pentry", "weekly", NotificationPeriod::Weekly, ContentKind::DutyRoster),
            ],
        }
    }
}

impl NotificationsConfig {
    /// Rule for a subscription, if one is configured.
    pub fn rule(&self, category: &str, subcategory: &str) -> Option<&NotificationRule> {
        self.rules
            .iter()
            .find(|rule| rule.category == category && rule.subcategory == subcategory)
    }
}

/// What a subscription delivers and how often.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRule {
    pub category: String,
    pub subcategory: String,
    /// At most one delivery per subscriber per period.
    pub period: NotificationPeriod,
    /// Message body delivered.
    pub content: ContentKind,
}

impl NotificationRule {
    pub fn new(
        category: impl Into<String>,
        subcategory: impl Into<String>,
        period: NotificationPeriod,
        content: ContentKind,
    ) -> Self {
        Self {
            category: category.into(),
            subcategory: subcategory.into(),
            period,
            content,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `debug`, `info`, `warning` or `error`. `SSIS_BOT_LOG_LEVEL` overrides it.
    pub level: String,
    /// Also write a daily-rolling log file under `<data_dir>/logs`.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warning".to_owned(),
            file: false,
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| BotError::Config(e.to_string()))
    }

    /// Load from `path` if it exists, otherwise use defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| BotError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file path: `bot_dirs::config_dir()/config.toml`.
    pub fn default_config_path() -> PathBuf {
        bot_dirs::config_file()
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.feeds
            .validate()
            .map_err(|e| BotError::Config(format!("feeds: {e}")))?;

        let refresh = &self.refresh;
        check_interval("refresh.min_interval_secs", refresh.min_interval_secs)?;
        check_interval("refresh.max_staleness_secs", refresh.max_staleness_secs)?;
        if refresh.max_staleness_secs < refresh.min_interval_secs {
            return Err(BotError::Config(
                "refresh.max_staleness_secs must not be shorter than refresh.min_interval_secs"
                    .into(),
            ));
        }

        let sched = &self.scheduler;
        for (name, value) in [
            ("scheduler.tick_secs", sched.tick_secs),
            ("scheduler.menu_refresh_secs", sched.menu_refresh_secs),
            ("scheduler.schedule_refresh_secs", sched.schedule_refresh_secs),
            ("scheduler.roster_refresh_secs", sched.roster_refresh_secs),
            ("scheduler.notify_secs", sched.notify_secs),
        ] {
            check_interval(name, value)?;
        }
        if let Some(window) = &sched.notify_window {
            window
                .validate()
                .map_err(|e| BotError::Config(format!("scheduler.notify_window: {e}")))?;
        }

        let mut keys = std::collections::BTreeSet::new();
        for slot in &self.announcements.slots {
            if slot.key.trim().is_empty() || slot.channel_id.trim().is_empty() {
                return Err(BotError::Config(
                    "announcement slots need a key and a channel_id".into(),
                ));
            }
            if !keys.insert(slot.key.as_str()) {
                return Err(BotError::Config(format!(
                    "duplicate announcement slot '{}'",
                    slot.key
                )));
            }
        }

        let mut rules = std::collections::BTreeSet::new();
        for rule in &self.notifications.rules {
            if !rules.insert((rule.category.as_str(), rule.subcategory.as_str())) {
                return Err(BotError::Config(format!(
                    "duplicate notification rule '{}/{}'",
                    rule.category, rule.subcategory
                )));
            }
        }

        url_ok("discord.api_base", &self.discord.api_base)?;
        if self.discord.timeout_seconds == 0 {
            return Err(BotError::Config(
                "discord.timeout_seconds must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn check_interval(name: &str, value: u64) -> Result<()> {
    if value == 0 || value > MAX_INTERVAL_SECS {
        return Err(BotError::Config(format!(
            "{name} must be between 1 and {MAX_INTERVAL_SECS} seconds"
        )));
    }
    Ok(())
}

fn url_ok(name: &str, value: &str) -> Result<()> {
    reqwest::Url::parse(value)
        .map(|_| ())
        .map_err(|e| BotError::Config(format!("{name} is not a valid URL: {e}")))
}

fn seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_INTERVAL_SECS) as i64)
}
