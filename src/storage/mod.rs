//! Storage abstractions for listing state.
//!
//! The store keeps one row per listing id plus a single baseline flag.
//! Every call is atomic on its own; callers never batch calls into a
//! transaction.
//!
//! ## Directory Structure
//!
//! ```text
//! data/
//! ├── state.json            # Baseline flag + listing rows
//! ├── monitor.lock          # Held while a cycle runs
//! └── backups/
//!     └── state_20260101_120000.json
//! ```

pub mod local;
pub mod memory;
mod state;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{ListingRecord, Novelty, StoredListing};

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Trait for listing state backends.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Whether the baseline cycle has completed.
    async fn is_initialized(&self) -> Result<bool>;

    /// Record that the baseline cycle has completed.
    async fn set_initialized(&self) -> Result<()>;

    /// Clear the baseline flag so the next cycle re-baselines.
    async fn reset_initialized(&self) -> Result<()>;

    /// Compare a record with its stored row.
    async fn novelty(&self, record: &ListingRecord) -> Result<Novelty>;

    /// True iff the id is unknown or its stored price differs.
    async fn is_new_or_updated(&self, record: &ListingRecord) -> Result<bool> {
        Ok(self.novelty(record).await?.is_novel())
    }

    /// Look up the stored row for an id.
    async fn get(&self, id: &str) -> Result<Option<StoredListing>>;

    /// Insert or update the row for `record.id`.
    async fn save(&self, record: &ListingRecord) -> Result<()>;

    /// Number of stored listings.
    async fn get_property_count(&self) -> Result<usize>;

    /// Most recent `last_seen_at` across all rows.
    async fn last_seen_at(&self) -> Result<Option<DateTime<Utc>>>;

    /// Write a backup copy of the state, if the backend keeps one.
    async fn backup(&self) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

#[async_trait]
impl<T: Storage + ?Sized> Storage for Box<T> {
    async fn is_initialized(&self) -> Result<bool> {
        (**self).is_initialized().await
    }

    async fn set_initialized(&self) -> Result<()> {
        (**self).set_initialized().await
    }

    async fn reset_initialized(&self) -> Result<()> {
        (**self).reset_initialized().await
    }

    async fn novelty(&self, record: &ListingRecord) -> Result<Novelty> {
        (**self).novelty(record).await
    }

    async fn get(&self, id: &str) -> Result<Option<StoredListing>> {
        (**self).get(id).await
    }

    async fn save(&self, record: &ListingRecord) -> Result<()> {
        (**self).save(record).await
    }

    async fn get_property_count(&self) -> Result<usize> {
        (**self).get_property_count().await
    }

    async fn last_seen_at(&self) -> Result<Option<DateTime<Utc>>> {
        (**self).last_seen_at().await
    }

    async fn backup(&self) -> Result<Option<PathBuf>> {
        (**self).backup().await
    }
}
