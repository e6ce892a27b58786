// src/models/mod.rs

//! Domain models for the monitor.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod listing;
mod stats;
mod stored;

// Re-export all public types
pub use config::{
    Config, DiscordConfig, HttpConfig, LoggingConfig, MonitorConfig, NepalBazaarConfig,
    SiteConfig, SourcesConfig, StorageConfig, UnknownAgePolicy,
};
pub use listing::{ListingRecord, Priority, PriorityThresholds, UNKNOWN_ADDRESS};
pub use stats::CycleStats;
pub use stored::{Novelty, StoredListing};
