// src/pipeline/schedule.rs

//! Long-running cycle loop.
//!
//! One cycle at a time, guarded by a lock file so a second process cannot
//! interleave its novelty checks with ours. The lock file is touched while
//! a cycle runs, so only a lock abandoned by a dead process goes stale. A
//! shutdown request lets the running cycle finish and cancels the sleep
//! that follows it.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;

use crate::error::Result;
use crate::models::{Config, CycleStats};
use crate::notify::NotificationSink;
use crate::pipeline::monitor::Monitor;
use crate::services::SourceAdapter;
use crate::storage::Storage;
use crate::utils::lock::{CycleLock, LOCK_FILE};

/// Timing and housekeeping settings for the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub interval: Duration,
    /// Relative jitter applied to each sleep, in `[0, 0.5)`
    pub jitter: f64,
    /// Back up every N completed cycles; 0 disables backups
    pub backup_every_cycles: u64,
    pub lock_path: PathBuf,
    /// Age after which a leftover lock file is ignored
    pub stale_lock_after: Duration,
}

/// Lower bound on the lock heartbeat period.
const MIN_LOCK_REFRESH: Duration = Duration::from_secs(1);

impl ScheduleConfig {
    pub fn from_config(config: &Config) -> Self {
        let interval = Duration::from_secs(config.monitor.interval_secs);
        Self {
            interval,
            jitter: config.monitor.interval_jitter,
            backup_every_cycles: if config.storage.backup_enabled {
                config.storage.backup_every_cycles
            } else {
                0
            },
            lock_path: config.storage.data_dir.join(LOCK_FILE),
            stale_lock_after: (interval * 4).max(Duration::from_secs(3600)),
        }
    }

    /// How often a running cycle touches its lock file.
    pub fn lock_refresh_every(&self) -> Duration {
        (self.stale_lock_after / 4).max(MIN_LOCK_REFRESH)
    }

    /// Sleep before the next cycle: `interval * uniform(1 - jitter, 1 + jitter)`.
    pub fn next_delay(&self) -> Duration {
        if self.jitter <= 0.0 {
            return self.interval;
        }
        let factor = rand::thread_rng().gen_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        self.interval.mul_f64(factor)
    }
}

/// Runs cycles until shut down.
pub struct Scheduler<S, N> {
    monitor: Monitor<S, N>,
    sources: Vec<Box<dyn SourceAdapter>>,
    config: ScheduleConfig,
}

impl<S: Storage, N: NotificationSink> Scheduler<S, N> {
    pub fn new(
        monitor: Monitor<S, N>,
        sources: Vec<Box<dyn SourceAdapter>>,
        config: ScheduleConfig,
    ) -> Self {
        Self {
            monitor,
            sources,
            config,
        }
    }

    pub fn monitor(&self) -> &Monitor<S, N> {
        &self.monitor
    }

    /// Run a single cycle under the lock, refreshing it until the cycle ends.
    pub async fn run_once(&self) -> Result<CycleStats> {
        let lock = CycleLock::acquire(&self.config.lock_path, self.config.stale_lock_after)?;

        let every = self.config.lock_refresh_every();
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        let run = self.monitor.run_cycle(&self.sources);
        tokio::pin!(run);

        loop {
            tokio::select! {
                result = &mut run => return result,
                _ = heartbeat.tick() => {
                    if let Err(e) = lock.refresh() {
                        log::warn!("Failed to refresh lock {}: {}", lock.path().display(), e);
                    }
                }
            }
        }
    }

    /// Loop until Ctrl-C or SIGTERM.
    pub async fn run(&self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Loop until `shutdown` resolves.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);
        let mut stopping = false;
        let mut completed: u64 = 0;
        let mut cycle: u64 = 0;

        log::info!(
            "Monitor started: {} sources, interval {}s",
            self.sources.len(),
            self.config.interval.as_secs()
        );

        loop {
            cycle += 1;
            log::info!("Starting cycle #{}", cycle);

            let run = self.run_once();
            tokio::pin!(run);
            let result = tokio::select! {
                result = &mut run => result,
                _ = &mut shutdown, if !stopping => {
                    stopping = true;
                    log::info!("Shutdown requested, finishing current cycle");
                    run.await
                }
            };

            match result {
                Ok(_) => {
                    completed += 1;
                    self.maybe_backup(completed).await;
                }
                Err(e) => log::error!("Cycle #{} failed: {}", cycle, e),
            }

            if stopping {
                break;
            }

            let delay = self.config.next_delay();
            log::info!("Next cycle in {:.0}s", delay.as_secs_f64());
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => {
                    log::info!("Shutdown requested");
                    break;
                }
            }
        }

        log::info!("Monitor stopped after {} cycles", cycle);
        Ok(())
    }

    async fn maybe_backup(&self, completed: u64) {
        let every = self.config.backup_every_cycles;
        if every == 0 || completed % every != 0 {
            return;
        }
        match self.monitor.storage().backup().await {
            Ok(Some(path)) => log::debug!("Periodic backup written to {}", path.display()),
            Ok(None) => {}
            Err(e) => log::error!("Backup failed: {}", e),
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
