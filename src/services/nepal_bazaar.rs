// src/services/nepal_bazaar.rs

//! Nepal Property Bazaar listing pages.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{Result, ScrapeError};
use crate::models::ListingRecord;
use crate::services::SourceAdapter;
use crate::services::parse::{
    Amenities, element_text, parse_age_minutes, parse_price, parse_selector, select_text,
};
use crate::utils::http::Fetcher;
use crate::utils::resolve_url;

#[derive(Debug)]
struct Selectors {
    item: Selector,
    price: Selector,
    title: Selector,
    address: Selector,
    date: Selector,
    amenity: Selector,
}

impl Selectors {
    fn new() -> Result<Self> {
        Ok(Self {
            item: parse_selector("div.item-listing-wrap")?,
            price: parse_selector("span.price")?,
            title: parse_selector("h2.item-title a")?,
            address: parse_selector("address.item-address")?,
            date: parse_selector("div.item-date")?,
            amenity: parse_selector("ul.item-amenities li")?,
        })
    }
}

/// Adapter for one Nepal Property Bazaar search page.
pub struct NepalBazaarSource {
    url: String,
    base: Url,
    fetcher: Arc<Fetcher>,
    selectors: Selectors,
}

impl NepalBazaarSource {
    pub fn new(url: impl Into<String>, fetcher: Arc<Fetcher>) -> Result<Self> {
        let url = url.into();
        let base = Url::parse(&url)?;
        Ok(Self {
            url,
            base,
            fetcher,
            selectors: Selectors::new()?,
        })
    }

    /// Extract listings from a search page; malformed items are skipped.
    pub fn parse_listings(&self, html: &str) -> Vec<ListingRecord> {
        let document = Html::parse_document(html);
        let items: Vec<_> = document.select(&self.selectors.item).collect();
        log::info!("Found {} listing items on {}", items.len(), self.url);

        items
            .into_iter()
            .filter_map(|item| self.parse_item(item))
            .collect()
    }

    fn parse_item(&self, item: ElementRef<'_>) -> Option<ListingRecord> {
        let Some(id) = item
            .value()
            .attr("data-hz-id")
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            log::warn!("Skipping listing without data-hz-id on {}", self.url);
            return None;
        };

        let price_text = select_text(item, &self.selectors.price);
        let Some(price) = price_text.as_deref().and_then(parse_price) else {
            log::warn!("Skipping listing {}: no parseable price", id);
            return None;
        };

        let Some(title_el) = item.select(&self.selectors.title).next() else {
            log::warn!("Skipping listing {}: no title", id);
            return None;
        };
        let href = title_el.value().attr("href").unwrap_or_default();
        let Some(url) = resolve_url(&self.base, href) else {
            log::warn!("Skipping listing {}: bad link '{}'", id, href);
            return None;
        };

        let timestamp_text = select_text(item, &self.selectors.date);
        let mut amenities = Amenities::default();
        for li in item.select(&self.selectors.amenity) {
            amenities.absorb(&element_text(li));
        }

        let mut record = ListingRecord::new(id, url, element_text(title_el), price)
            .with_raw("price_text", price_text.unwrap_or_default());
        if let Some(address) = select_text(item, &self.selectors.address) {
            record.address = address;
        }
        record.posted_minutes_ago = timestamp_text.as_deref().and_then(parse_age_minutes);
        record.bedrooms = amenities.bedrooms;
        record.bathrooms = amenities.bathrooms;
        record.property_type = amenities.property_type;
        if let Some(text) = timestamp_text {
            record = record.with_raw("timestamp_text", text);
        }
        Some(record)
    }
}

#[async_trait]
impl SourceAdapter for NepalBazaarSource {
    fn name(&self) -> &str {
        "nepal_bazaar"
    }

    async fn scrape(&self) -> std::result::Result<Vec<ListingRecord>, ScrapeError> {
        let html = self.fetcher.fetch_text(&self.url).await?;
        let listings = self.parse_listings(&html);
        log::info!("Parsed {} listings from {}", listings.len(), self.url);
        Ok(listings)
    }
}
