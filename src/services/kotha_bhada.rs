// src/services/kotha_bhada.rs

//! KothaBhada latest-properties feed.
//!
//! The list page only links to detail pages; each detail page carries an
//! amenity grid whose cells read `"<label>\n<value>"` in a fixed order.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{Result, ScrapeError};
use crate::models::ListingRecord;
use crate::services::SourceAdapter;
use crate::services::parse::{minutes_since_date, parse_price, parse_selector, select_text};
use crate::utils::http::Fetcher;
use crate::utils::{resolve_url, strip_symbols};

// Positions in the amenity grid.
const RENT_PRICE: usize = 1;
const BEDROOM: usize = 2;
const BATHROOM: usize = 3;
const CATEGORY: usize = 9;
const AD_ID: usize = 14;
const POSTED_ON: usize = 16;

#[derive(Debug)]
struct Selectors {
    card: Selector,
    link: Selector,
    title: Selector,
    location: Selector,
    amenity: Selector,
}

/// Adapter for KothaBhada, fetching one detail page per card.
pub struct KothaBhadaSource {
    url: String,
    base: Url,
    fetcher: Arc<Fetcher>,
    selectors: Selectors,
}

impl KothaBhadaSource {
    pub fn new(url: impl Into<String>, fetcher: Arc<Fetcher>) -> Result<Self> {
        let url = url.into();
        let base = Url::parse(&url)?;
        Ok(Self {
            url,
            base,
            fetcher,
            selectors: Selectors {
                card: parse_selector("body > section.siteSec > div > div.row-cols-5.row > div")?,
                link: parse_selector("a")?,
                title: parse_selector(".propertyTitle")?,
                location: parse_selector(".locationPin")?,
                amenity: parse_selector(".row.border.amenitiesWrapper > div")?,
            },
        })
    }

    /// Detail page links from the list page, in page order, without duplicates.
    pub fn parse_links(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut links: Vec<String> = Vec::new();
        for card in document.select(&self.selectors.card) {
            let href = card
                .select(&self.selectors.link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| resolve_url(&self.base, href));
            match href {
                Some(link) if !links.contains(&link) => links.push(link),
                Some(_) => {}
                None => log::debug!("Card without link on {}", self.url),
            }
        }
        links
    }

    /// Build a listing from a detail page.
    pub fn parse_detail(
        &self,
        html: &str,
        url: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<ListingRecord, ScrapeError> {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let cells: Vec<ElementRef<'_>> = document.select(&self.selectors.amenity).collect();
        let value = |i: usize| cells.get(i).and_then(|cell| amenity_value(*cell));

        let id = value(AD_ID)
            .map(|v| strip_symbols(&v))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ScrapeError::parse(url, "missing ad id"))?;
        let price = value(RENT_PRICE)
            .as_deref()
            .and_then(parse_price)
            .ok_or_else(|| ScrapeError::parse(url, "missing rent price"))?;

        let title = select_text(root, &self.selectors.title)
            .map(|t| strip_symbols(&t))
            .unwrap_or_default();
        let mut record = ListingRecord::new(id, url, title, price);
        if let Some(address) = select_text(root, &self.selectors.location)
            .map(|a| strip_symbols(&a))
            .filter(|a| !a.is_empty())
        {
            record.address = address;
        }
        record.bedrooms = value(BEDROOM).and_then(|v| strip_symbols(&v).parse().ok());
        record.bathrooms = value(BATHROOM)
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|n| n.is_finite() && *n >= 0.0);
        record.property_type = value(CATEGORY).filter(|c| !c.is_empty());
        if let Some(posted) = value(POSTED_ON) {
            record.posted_minutes_ago = minutes_since_date(&posted, now);
            record = record.with_raw("posted_on", posted);
        }
        Ok(record)
    }

    async fn fetch_detail(
        &self,
        link: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<ListingRecord, ScrapeError> {
        let html = self.fetcher.fetch_text(link).await?;
        self.parse_detail(&html, link, now)
    }
}

/// Last token of the last line of a grid cell: `"Rent Price\nRs. 12,000"` -> `"12,000"`.
fn amenity_value(cell: ElementRef<'_>) -> Option<String> {
    let text: String = cell.text().collect();
    let last_line = text.trim().lines().next_back()?;
    last_line
        .split_whitespace()
        .next_back()
        .map(str::to_string)
}

#[async_trait]
impl SourceAdapter for KothaBhadaSource {
    fn name(&self) -> &str {
        "kotha_bhada"
    }

    async fn scrape(&self) -> std::result::Result<Vec<ListingRecord>, ScrapeError> {
        let html = self.fetcher.fetch_text(&self.url).await?;
        let links = self.parse_links(&html);
        log::info!("Found {} detail links on {}", links.len(), self.url);

        let now = Utc::now();
        let delay = self.fetcher.request_delay();
        let mut details = stream::iter(links)
            .map(|link| async move {
                let result = self.fetch_detail(&link, now).await;
                (link, result)
            })
            .buffered(self.fetcher.max_concurrent());

        let mut listings = Vec::new();
        while let Some((link, result)) = details.next().await {
            match result {
                Ok(record) => listings.push(record),
                Err(e) => log::warn!("Skipping {}: {}", link, e),
            }

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        log::info!("Parsed {} listings from {}", listings.len(), self.url);
        Ok(listings)
    }
}
