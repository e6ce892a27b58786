//! In-memory image of the listing state shared by the storage backends.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ListingRecord, Novelty, StoredListing};

pub const SCHEMA_VERSION: u32 = 1;

/// Contents of `state.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateFile {
    pub schema_version: u32,

    /// Baseline flag
    #[serde(default)]
    pub initialized: bool,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Rows keyed by listing id
    #[serde(default)]
    pub listings: BTreeMap<String, StoredListing>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            initialized: false,
            updated_at: None,
            listings: BTreeMap::new(),
        }
    }
}

impl StateFile {
    pub fn novelty(&self, record: &ListingRecord) -> Novelty {
        Novelty::of(record, self.listings.get(&record.id))
    }

    /// Upsert a record, returning what it was relative to the previous row.
    pub fn save(&mut self, record: &ListingRecord, now: DateTime<Utc>) -> Novelty {
        let novelty = self.novelty(record);
        match self.listings.get_mut(&record.id) {
            Some(stored) => stored.observe(record.clone(), now),
            None => {
                self.listings
                    .insert(record.id.clone(), StoredListing::first(record.clone(), now));
            }
        }
        self.updated_at = Some(now);
        novelty
    }

    pub fn last_seen_at(&self) -> Option<DateTime<Utc>> {
        self.listings.values().map(|l| l.last_seen_at).max()
    }
}
