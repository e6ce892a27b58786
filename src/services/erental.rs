// src/services/erental.rs

//! eRental Service listing grid.
//!
//! Each card carries an ordered list of icon items:
//! `[address, "ID: n", "3 Bedroom", "1 Kitchen", "1 Living", "3 Bathroom",
//! "Water - Yes", "2.5 Floor", "Rs. 105000", "/Month"]`. Fields are read by
//! position.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{Result, ScrapeError};
use crate::models::ListingRecord;
use crate::services::SourceAdapter;
use crate::services::parse::{element_text, parse_price, parse_selector, select_text};
use crate::utils::http::Fetcher;
use crate::utils::{resolve_url, strip_symbols};

const ADDRESS: usize = 0;
const PROPERTY_ID: usize = 1;
const BEDROOMS: usize = 2;
const BATHROOMS: usize = 5;
const PRICE: usize = 8;

/// Ids are namespaced since the site uses bare numbers.
const ID_PREFIX: &str = "erental-";

#[derive(Debug)]
struct Selectors {
    item: Selector,
    title: Selector,
    link: Selector,
    field: Selector,
}

/// Adapter for the eRental Service property grid.
pub struct ERentalSource {
    url: String,
    base: Url,
    fetcher: Arc<Fetcher>,
    selectors: Selectors,
}

impl ERentalSource {
    pub fn new(url: impl Into<String>, fetcher: Arc<Fetcher>) -> Result<Self> {
        let url = url.into();
        let base = Url::parse(&url)?;
        Ok(Self {
            url,
            base,
            fetcher,
            selectors: Selectors {
                item: parse_selector("div.jet-listing-grid__item")?,
                title: parse_selector("h4")?,
                link: parse_selector("a")?,
                field: parse_selector(".elementor-icon-list-item")?,
            },
        })
    }

    pub fn parse_listings(&self, html: &str) -> Vec<ListingRecord> {
        let document = Html::parse_document(html);
        let items: Vec<_> = document.select(&self.selectors.item).collect();
        log::info!("Found {} listing cards on {}", items.len(), self.url);

        items
            .into_iter()
            .filter_map(|item| self.parse_item(item))
            .collect()
    }

    fn parse_item(&self, item: ElementRef<'_>) -> Option<ListingRecord> {
        let fields: Vec<String> = item.select(&self.selectors.field).map(element_text).collect();

        let Some(id) = fields
            .get(PROPERTY_ID)
            .and_then(|f| strip_symbols(f).split(' ').next_back().map(str::to_string))
            .filter(|id| id.chars().any(|c| c.is_ascii_digit()))
        else {
            log::warn!("Skipping card without property id on {}", self.url);
            return None;
        };

        let Some(price) = fields.get(PRICE).and_then(|f| parse_price(f)) else {
            log::warn!("Skipping listing {}: no parseable price", id);
            return None;
        };

        let Some(url) = item
            .select(&self.selectors.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve_url(&self.base, href))
        else {
            log::warn!("Skipping listing {}: no link", id);
            return None;
        };

        let title = select_text(item, &self.selectors.title).unwrap_or_default();
        let mut record = ListingRecord::new(format!("{ID_PREFIX}{id}"), url, title, price)
            .with_raw("fields", fields.clone());

        if let Some(address) = fields
            .get(ADDRESS)
            .map(|f| strip_symbols(f))
            .filter(|a| !a.is_empty())
        {
            record.address = address;
        }
        record.bedrooms = fields
            .get(BEDROOMS)
            .and_then(|f| leading_number(f))
            .map(|n| n as u32);
        record.bathrooms = fields.get(BATHROOMS).and_then(|f| leading_number(f));
        Some(record)
    }
}

/// First token as a number: "2.5 Bathroom" -> 2.5.
fn leading_number(text: &str) -> Option<f64> {
    text.split_whitespace()
        .next()?
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n >= 0.0)
}

#[async_trait]
impl SourceAdapter for ERentalSource {
    fn name(&self) -> &str {
        "erental"
    }

    async fn scrape(&self) -> std::result::Result<Vec<ListingRecord>, ScrapeError> {
        let html = self.fetcher.fetch_text(&self.url).await?;
        let listings = self.parse_listings(&html);
        log::info!("Parsed {} listings from {}", listings.len(), self.url);
        Ok(listings)
    }
}
