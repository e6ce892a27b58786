//! Source adapters.
//!
//! Each adapter fetches one site and turns its markup into
//! [`ListingRecord`]s. A whole-call failure is a [`ScrapeError`]; a single
//! malformed item is logged and left out of the result.

mod erental;
mod kotha_bhada;
mod nepal_bazaar;
pub mod parse;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Result, ScrapeError};
use crate::models::{Config, ListingRecord};
use crate::utils::http::Fetcher;

pub use erental::ERentalSource;
pub use kotha_bhada::KothaBhadaSource;
pub use nepal_bazaar::NepalBazaarSource;

/// A site that produces listings.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Fetch and parse the current listings.
    async fn scrape(&self) -> std::result::Result<Vec<ListingRecord>, ScrapeError>;
}

/// Build the enabled adapters: Nepal Property Bazaar pages first, then
/// eRental, then KothaBhada.
pub fn build_sources(
    config: &Config,
    fetcher: Arc<Fetcher>,
) -> Result<Vec<Box<dyn SourceAdapter>>> {
    let mut sources: Vec<Box<dyn SourceAdapter>> = Vec::new();

    for url in &config.sources.nepal_bazaar.urls {
        sources.push(Box::new(NepalBazaarSource::new(url, Arc::clone(&fetcher))?));
    }
    if config.sources.erental.enabled {
        sources.push(Box::new(ERentalSource::new(
            &config.sources.erental.url,
            Arc::clone(&fetcher),
        )?));
    }
    if config.sources.kotha_bhada.enabled {
        sources.push(Box::new(KothaBhadaSource::new(
            &config.sources.kotha_bhada.url,
            Arc::clone(&fetcher),
        )?));
    }

    log::info!(
        "Configured {} sources: {}",
        sources.len(),
        sources.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
    );
    Ok(sources)
}
