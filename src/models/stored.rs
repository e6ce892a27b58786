//! Persisted listing state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ListingRecord;

/// How a scraped record relates to what the store already knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Novelty {
    /// No row with this id
    New,
    /// Known id, different price
    PriceChanged { previous: u32 },
    /// Known id, same price
    Unchanged,
}

impl Novelty {
    /// Compare a record against the stored row for its id.
    pub fn of(record: &ListingRecord, stored: Option<&StoredListing>) -> Self {
        match stored {
            None => Novelty::New,
            Some(s) if s.record.price != record.price => Novelty::PriceChanged {
                previous: s.record.price,
            },
            Some(_) => Novelty::Unchanged,
        }
    }

    pub fn is_novel(&self) -> bool {
        !matches!(self, Novelty::Unchanged)
    }
}

/// One row of listing state, keyed by `record.id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredListing {
    /// Latest observation
    pub record: ListingRecord,

    pub first_seen_at: DateTime<Utc>,

    pub last_seen_at: DateTime<Utc>,

    /// Price before the most recent price change
    #[serde(default)]
    pub last_price: Option<u32>,

    #[serde(default)]
    pub price_changed_at: Option<DateTime<Utc>>,
}

impl StoredListing {
    /// Row for a first observation.
    pub fn first(record: ListingRecord, now: DateTime<Utc>) -> Self {
        Self {
            record,
            first_seen_at: now,
            last_seen_at: now,
            last_price: None,
            price_changed_at: None,
        }
    }

    /// Apply a later observation of the same id.
    ///
    /// `last_seen_at` always moves; the change-tracking fields only move on a
    /// price delta and otherwise keep the last recorded change.
    pub fn observe(&mut self, record: ListingRecord, now: DateTime<Utc>) {
        if record.price != self.record.price {
            self.last_price = Some(self.record.price);
            self.price_changed_at = Some(now);
        }
        self.last_seen_at = now;
        self.record = record;
    }
}
