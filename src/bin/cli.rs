//! Property Monitor CLI
//!
//! Runs the monitor loop or a single cycle, plus maintenance commands.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use property_monitor::{
    config::load_config,
    error::Result,
    models::Config,
    notify::{LogNotifier, NotificationSink, build_notifier},
    pipeline::{Monitor, MonitorPolicy, ScheduleConfig, Scheduler},
    services::build_sources,
    storage::{LocalStorage, MemoryStorage, Storage},
    utils::{http::Fetcher, lock::CycleLock},
};

/// Rental listing monitor
#[derive(Parser, Debug)]
#[command(
    name = "property-monitor",
    version,
    about = "Watches rental listing sites and notifies on new listings"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run cycles until interrupted
    Run {
        /// Keep state in memory and log instead of notifying
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a single cycle and print its statistics
    Once {
        /// Keep state in memory and log instead of notifying
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate configuration
    Validate,

    /// Check that the monitor is recording listings
    Health {
        /// Maximum age of the latest observation
        #[arg(long, default_value_t = 2)]
        max_age_hours: i64,
    },

    /// Send a test notification
    TestNotify,

    /// Clear the baseline flag so the next cycle records without notifying
    Reset,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

async fn open_storage(config: &Config) -> Result<LocalStorage> {
    Ok(LocalStorage::open(&config.storage.data_dir)
        .await?
        .with_backup_retention(config.storage.backup_retention_days))
}

async fn build_scheduler(
    config: &Config,
    dry_run: bool,
) -> Result<Scheduler<Box<dyn Storage>, Box<dyn NotificationSink>>> {
    let storage: Box<dyn Storage>;
    let notifier: Box<dyn NotificationSink>;
    if dry_run {
        log::info!("Dry run: state stays in memory, listings are only logged");
        storage = Box::new(MemoryStorage::seeded(&[]));
        notifier = Box::new(LogNotifier::new(config.priority.clone()));
    } else {
        storage = Box::new(open_storage(config).await?);
        notifier = build_notifier(config)?;
    }

    let fetcher = Arc::new(Fetcher::new(&config.http)?);
    let sources = build_sources(config, fetcher)?;
    let monitor = Monitor::new(storage, notifier, MonitorPolicy::from_config(config));
    Ok(Scheduler::new(
        monitor,
        sources,
        ScheduleConfig::from_config(config),
    ))
}

async fn check_health(config: &Config, max_age_hours: i64) -> Result<bool> {
    let state_path = config.state_path();
    if !state_path.exists() {
        log::error!("State file not found at {}", state_path.display());
        return Ok(false);
    }

    let storage = open_storage(config).await?;
    if !storage.is_initialized().await? {
        log::warn!("Monitor not yet initialized (first run pending)");
        return Ok(true);
    }

    let count = storage.get_property_count().await?;
    if count == 0 {
        log::warn!("No listings recorded");
        return Ok(false);
    }

    if let Some(last_seen) = storage.last_seen_at().await? {
        let age = Utc::now() - last_seen;
        if age > Duration::hours(max_age_hours) {
            log::warn!(
                "Last listing update was {:.1} hours ago; the monitor may be stalled",
                age.num_minutes() as f64 / 60.0
            );
            return Ok(false);
        }
        log::info!("Last update {} minutes ago", age.num_minutes());
    }

    log::info!("Healthy: {} listings tracked", count);
    Ok(true)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(cli.verbose, &config.logging.level);

    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Run { dry_run } => {
            let scheduler = build_scheduler(&config, dry_run).await?;
            scheduler.run().await?;
        }

        Command::Once { dry_run } => {
            let scheduler = build_scheduler(&config, dry_run).await?;
            let stats = scheduler.run_once().await?;
            println!("{stats}");
        }

        Command::Validate => {
            // load_config has already validated.
            log::info!("✓ Config OK");
            log::info!("  Budget: Rs {}/month", config.monitor.max_price);
            log::info!("  Window: {}h", config.monitor.time_window_hours);
            log::info!(
                "  Sources: {} Nepal Property Bazaar pages, eRental {}, KothaBhada {}",
                config.sources.nepal_bazaar.urls.len(),
                enabled(config.sources.erental.enabled),
                enabled(config.sources.kotha_bhada.enabled)
            );
            log::info!(
                "  Discord: {}",
                if config.discord.webhook_url.is_some() {
                    "configured"
                } else {
                    "not configured"
                }
            );
        }

        Command::Health { max_age_hours } => {
            if !check_health(&config, max_age_hours).await? {
                return Ok(ExitCode::FAILURE);
            }
        }

        Command::TestNotify => {
            let notifier = build_notifier(&config)?;
            if !notifier.send_test_message().await? {
                log::error!("Test notification via {} was rejected", notifier.name());
                return Ok(ExitCode::FAILURE);
            }
            log::info!("Test notification sent via {}", notifier.name());
        }

        Command::Reset => {
            // Refuse while a cycle runs; a baseline finishing after us would set the flag again.
            let schedule = ScheduleConfig::from_config(&config);
            let _lock = CycleLock::acquire(&schedule.lock_path, schedule.stale_lock_after)?;
            let storage = open_storage(&config).await?;
            storage.reset_initialized().await?;
            log::info!("Baseline flag cleared; the next cycle will record without notifying");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn enabled(flag: bool) -> &'static str {
    if flag { "enabled" } else { "disabled" }
}
