//! In-process storage with the same semantics as [`LocalStorage`].
//!
//! Used for dry runs and tests; nothing survives the process.
//!
//! [`LocalStorage`]: crate::storage::LocalStorage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::{ListingRecord, Novelty, StoredListing};
use crate::storage::Storage;
use crate::storage::state::StateFile;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<StateFile>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already-baselined store holding `records`.
    pub fn seeded(records: &[ListingRecord]) -> Self {
        let mut state = StateFile::default();
        let now = Utc::now();
        for record in records {
            state.save(record, now);
        }
        state.initialized = true;
        Self {
            state: Mutex::new(state),
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn is_initialized(&self) -> Result<bool> {
        Ok(self.state.lock().await.initialized)
    }

    async fn set_initialized(&self) -> Result<()> {
        self.state.lock().await.initialized = true;
        Ok(())
    }

    async fn reset_initialized(&self) -> Result<()> {
        self.state.lock().await.initialized = false;
        Ok(())
    }

    async fn novelty(&self, record: &ListingRecord) -> Result<Novelty> {
        Ok(self.state.lock().await.novelty(record))
    }

    async fn get(&self, id: &str) -> Result<Option<StoredListing>> {
        Ok(self.state.lock().await.listings.get(id).cloned())
    }

    async fn save(&self, record: &ListingRecord) -> Result<()> {
        self.state.lock().await.save(record, Utc::now());
        Ok(())
    }

    async fn get_property_count(&self) -> Result<usize> {
        Ok(self.state.lock().await.listings.len())
    }

    async fn last_seen_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.state.lock().await.last_seen_at())
    }
}
