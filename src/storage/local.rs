//! Local filesystem storage implementation.
//!
//! `state.json` is the only copy of the listing state. Every call reads it
//! from disk, and every mutating call rewrites it under the same lock, so a
//! `reset` or `once` from another process is seen by a running loop on its
//! next call. Writes go to a per-process temp file that is then renamed
//! over the old one, so a crash leaves either the previous or the new state
//! on disk, never a torn file.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── state.json            # Baseline flag + listing rows
//! └── backups/              # Timestamped copies of state.json
//!     └── state_YYYYmmdd_HHMMSS.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{ListingRecord, Novelty, StoredListing};
use crate::storage::Storage;
use crate::storage::state::{SCHEMA_VERSION, StateFile};

const STATE_KEY: &str = "state.json";
const BACKUP_DIR: &str = "backups";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Local filesystem storage backend.
#[derive(Debug)]
pub struct LocalStorage {
    root_dir: PathBuf,
    /// Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
    backup_retention: Duration,
}

impl LocalStorage {
    /// Open the store rooted at `root_dir`, creating it on first use.
    ///
    /// An existing `state.json` is validated but never rewritten here, so
    /// read-only commands leave a running monitor's file alone. An
    /// unreadable or corrupt file is a storage error rather than an empty
    /// store, so a damaged file never triggers a silent re-baseline.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        tokio::fs::create_dir_all(&root_dir).await?;

        let storage = Self {
            root_dir,
            lock: Mutex::new(()),
            backup_retention: Duration::from_secs(7 * 24 * 3600),
        };

        let path = storage.path(STATE_KEY);
        match storage.read_state().await? {
            Some(state) => log::debug!(
                "Loaded {} listings from {}",
                state.listings.len(),
                path.display()
            ),
            None => {
                log::info!("Creating new state file at {}", path.display());
                storage.write_json(STATE_KEY, &StateFile::default()).await?;
            }
        }
        Ok(storage)
    }

    /// Keep backups for `days` days.
    pub fn with_backup_retention(mut self, days: u32) -> Self {
        self.backup_retention = Duration::from_secs(u64::from(days) * 24 * 3600);
        self
    }

    /// Directory holding the state file.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    ///
    /// The temp name carries the pid and a sequence number so concurrent
    /// writers never rename each other's half-written file into place.
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(format!(".{}.{}.tmp", std::process::id(), seq));
        let tmp = path.with_file_name(tmp_name);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read `state.json`; `None` if it does not exist yet.
    async fn read_state(&self) -> Result<Option<StateFile>> {
        let path = self.path(STATE_KEY);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Io(e)),
        };

        let state: StateFile = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::storage(format!("state file {} is corrupted: {e}", path.display()))
        })?;
        if state.schema_version != SCHEMA_VERSION {
            return Err(AppError::storage(format!(
                "state file {} has schema version {}, expected {}",
                path.display(),
                state.schema_version,
                SCHEMA_VERSION
            )));
        }
        Ok(Some(state))
    }

    /// Current state; a file removed since `open` reads as an empty store.
    async fn load(&self) -> Result<StateFile> {
        Ok(self.read_state().await?.unwrap_or_default())
    }

    /// Read a value from the current on-disk state.
    async fn inspect<T>(&self, read: impl FnOnce(&StateFile) -> T) -> Result<T> {
        let _guard = self.lock.lock().await;
        let state = self.load().await?;
        Ok(read(&state))
    }

    /// Reload the state, apply `change`, and persist the result.
    async fn mutate<T>(&self, change: impl FnOnce(&mut StateFile) -> T) -> Result<T> {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;
        let out = change(&mut state);
        self.write_json(STATE_KEY, &state)
            .await
            .map_err(|e| AppError::storage(format!("failed to persist state: {e}")))?;
        Ok(out)
    }

    /// Copy the state file into `backups/` and prune expired backups.
    pub async fn create_backup(&self) -> Result<PathBuf> {
        let name = format!("state_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
        let key = format!("{BACKUP_DIR}/{name}");

        {
            let _guard = self.lock.lock().await;
            let state = self.load().await?;
            self.write_json(&key, &state).await?;
        }
        log::info!("Backup created at {}", self.path(&key).display());

        let removed = self.prune_backups().await?;
        if removed > 0 {
            log::debug!("Removed {removed} expired backups");
        }
        Ok(self.path(&key))
    }

    /// Delete backups older than the retention period.
    async fn prune_backups(&self) -> Result<usize> {
        let dir = self.path(BACKUP_DIR);
        let cutoff = SystemTime::now()
            .checked_sub(self.backup_retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            if modified < cutoff {
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn is_initialized(&self) -> Result<bool> {
        self.inspect(|state| state.initialized).await
    }

    async fn set_initialized(&self) -> Result<()> {
        self.mutate(|state| state.initialized = true).await?;
        log::info!("Storage marked initialized");
        Ok(())
    }

    async fn reset_initialized(&self) -> Result<()> {
        self.mutate(|state| state.initialized = false).await?;
        log::warn!("Storage baseline flag cleared");
        Ok(())
    }

    async fn novelty(&self, record: &ListingRecord) -> Result<Novelty> {
        let novelty = self.inspect(|state| state.novelty(record)).await?;
        if let Novelty::PriceChanged { previous } = novelty {
            log::info!(
                "Price changed for {}: {} -> {}",
                record.id,
                previous,
                record.price
            );
        }
        Ok(novelty)
    }

    async fn get(&self, id: &str) -> Result<Option<StoredListing>> {
        self.inspect(|state| state.listings.get(id).cloned()).await
    }

    async fn save(&self, record: &ListingRecord) -> Result<()> {
        let now = Utc::now();
        let novelty = self.mutate(|state| state.save(record, now)).await?;
        log::debug!("Saved listing {} ({:?})", record.id, novelty);
        Ok(())
    }

    async fn get_property_count(&self) -> Result<usize> {
        self.inspect(|state| state.listings.len()).await
    }

    async fn last_seen_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.inspect(StateFile::last_seen_at).await
    }

    async fn backup(&self) -> Result<Option<PathBuf>> {
        self.create_backup().await.map(Some)
    }
}
