//! CLI binary for the SSIS bot.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ssis_bot::channels::{DiscordAdapter, MemoryChannel, MessageChannel};
use ssis_bot::notify::load_schema;
use ssis_bot::scheduler::{Scheduler, TaskRunOutcome, builtin_tasks};
use ssis_bot::status::StatusReport;
use ssis_bot::store::DocumentStore;
use ssis_bot::{Assistant, BotConfig, logging};
use ssis_feeds::HttpFetcher;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// SSIS bot: cached school feeds, self-updating announcements and personal
/// notifications.
#[derive(Parser)]
#[command(name = "ssis-bot", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, env = "SSIS_BOT_CONFIG")]
    config: Option<PathBuf>,

    /// Print messages instead of sending them to Discord.
    #[arg(long)]
    dry_run: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run the scheduler until Ctrl+C.
    Run,

    /// Refresh one source now (`menu`, `duty-roster`, `schedule:<class>`).
    Refresh { source: String },

    /// Re-render and publish one announcement slot now.
    Sync { slot: String },

    /// Notify everyone due for a subscription now.
    Notify {
        category: String,
        subcategory: String,
    },

    /// Subscribe a user to notifications.
    Subscribe {
        category: String,
        subcategory: String,
        user_id: String,
    },

    /// Unsubscribe a user from notifications.
    Unsubscribe {
        category: String,
        subcategory: String,
        user_id: String,
    },

    /// Show scheduler runs and published announcements, then exit.
    Status,

    /// Write the default configuration to the config path.
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(BotConfig::default_config_path);
    let command = cli.command.unwrap_or(Command::Run);

    if matches!(command, Command::InitConfig) {
        BotConfig::default().save_to_file(&config_path)?;
        println!("wrote {}", config_path.display());
        return Ok(());
    }

    let config = BotConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    config.validate()?;
    let _log_guard = logging::init(&config.logging, &config.storage.logs_dir())?;
    let config = Arc::new(config);

    let store = Arc::new(DocumentStore::open(config.storage.data_dir())?);
    if matches!(command, Command::Status) {
        print!("{}", StatusReport::collect(&store)?);
        return Ok(());
    }

    let schema_path = config.storage.subscription_schema();
    let schema = load_schema(&schema_path)
        .with_context(|| format!("loading subscription schema {}", schema_path.display()))?;

    let fetcher = Arc::new(HttpFetcher::new(config.feeds.clone())?);
    let channel: Arc<dyn MessageChannel> = if cli.dry_run {
        info!("dry run: messages are logged, not sent");
        Arc::new(MemoryChannel::new())
    } else {
        Arc::new(DiscordAdapter::from_config(&config.discord)?)
    };
    let assistant = Arc::new(Assistant::new(
        Arc::clone(&config),
        Arc::clone(&store),
        fetcher,
        channel,
    ));
    assistant.ledger().ensure_schema(&schema)?;

    match command {
        Command::Run => run_scheduler(config, store, assistant).await,
        Command::Refresh { source } => {
            let key = assistant.resolve_source(&source, chrono::Utc::now())?;
            let outcome = assistant.refresh_now(&key).await?;
            println!("{key}: {outcome}");
            Ok(())
        }
        Command::Sync { slot } => {
            let outcome = assistant.sync_announcement_now(&slot).await?;
            println!("{slot}: {outcome:?}");
            Ok(())
        }
        Command::Notify {
            category,
            subcategory,
        } => {
            let report = assistant
                .notify_due_subscribers(&category, &subcategory)
                .await?;
            if let Some(reason) = &report.skipped_reason {
                println!("skipped: {reason}");
            }
            println!(
                "delivered: {}, failed: {}",
                report.delivered.len(),
                report.failed.len()
            );
            for (user, reason) in &report.failed {
                println!("  {user}: {reason}");
            }
            Ok(())
        }
        Command::Subscribe {
            category,
            subcategory,
            user_id,
        } => {
            let added = assistant
                .ledger()
                .subscribe(&category, &subcategory, &user_id)?;
            println!("{}", if added { "subscribed" } else { "already subscribed" });
            Ok(())
        }
        Command::Unsubscribe {
            category,
            subcategory,
            user_id,
        } => {
            let removed = assistant
                .ledger()
                .unsubscribe(&category, &subcategory, &user_id)?;
            println!("{}", if removed { "unsubscribed" } else { "was not subscribed" });
            Ok(())
        }
        Command::Status | Command::InitConfig => Ok(()),
    }
}

async fn run_scheduler(
    config: Arc<BotConfig>,
    store: Arc<DocumentStore>,
    assistant: Arc<Assistant>,
) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut scheduler = Scheduler::new(assistant)
        .with_store(store)
        .with_tick_interval(config.scheduler.tick_secs)
        .with_history_limit(config.scheduler.history_limit)
        .with_results(tx);
    for task in builtin_tasks(&config.scheduler) {
        scheduler.add_task(task);
    }

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            cancel_clone.cancel();
        }
    });

    tokio::spawn(async move {
        while let Some(run) = rx.recv().await {
            match run.outcome {
                TaskRunOutcome::Error => warn!(task = %run.task_id, "{}", run.summary),
                _ => info!(task = %run.task_id, "{}", run.summary),
            }
        }
    });

    scheduler.run(cancel).await?;
    Ok(())
}
