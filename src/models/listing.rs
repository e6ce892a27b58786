//! Listing record data structure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Address used when a source does not expose one.
pub const UNKNOWN_ADDRESS: &str = "Unknown";

/// One observation of a rental listing, normalized by a source adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    /// Stable identifier of the physical listing on its site
    pub id: String,

    /// Absolute URL of the listing page
    pub url: String,

    /// Listing title
    pub title: String,

    /// Display address ("Unknown" when the site omits it)
    pub address: String,

    /// Monthly rent
    pub price: u32,

    #[serde(default)]
    pub bedrooms: Option<u32>,

    #[serde(default)]
    pub bathrooms: Option<f64>,

    /// Free text such as "Flat / Apartment"
    #[serde(default)]
    pub property_type: Option<String>,

    /// Listing age at scrape time; `None` means unknown, not new
    #[serde(default)]
    pub posted_minutes_ago: Option<u32>,

    /// Raw scraped fragments kept for diagnostics
    #[serde(default)]
    pub raw_data: BTreeMap<String, serde_json::Value>,
}

impl ListingRecord {
    /// Create a record with the required fields; amenity metadata stays unknown.
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        price: u32,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: title.into(),
            address: UNKNOWN_ADDRESS.to_string(),
            price,
            bedrooms: None,
            bathrooms: None,
            property_type: None,
            posted_minutes_ago: None,
            raw_data: BTreeMap::new(),
        }
    }

    /// Check the invariants adapters are expected to uphold.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::validation(format!(
                "listing without id (url: {})",
                self.url
            )));
        }

        let url = Url::parse(&self.url).map_err(|e| {
            AppError::validation(format!("listing {} has invalid url {}: {e}", self.id, self.url))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(AppError::validation(format!(
                "listing {} url is not absolute: {}",
                self.id, self.url
            )));
        }

        if let Some(baths) = self.bathrooms {
            if !baths.is_finite() || baths < 0.0 {
                return Err(AppError::validation(format!(
                    "listing {} has invalid bathroom count {baths}",
                    self.id
                )));
            }
        }

        Ok(())
    }

    /// Price bucket used for presentation.
    pub fn priority(&self, thresholds: &PriorityThresholds) -> Priority {
        thresholds.classify(self.price)
    }

    /// Human readable age, e.g. "40 minutes ago" or "2 hours ago".
    pub fn posted_label(&self) -> Option<String> {
        let minutes = self.posted_minutes_ago?;
        let label = if minutes < 60 {
            format!("{minutes} minutes ago")
        } else if minutes < 1440 {
            let hours = minutes / 60;
            format!("{hours} hour{} ago", if hours > 1 { "s" } else { "" })
        } else {
            let days = minutes / 1440;
            format!("{days} day{} ago", if days > 1 { "s" } else { "" })
        };
        Some(label)
    }

    /// Attach a raw fragment for diagnostics.
    pub fn with_raw(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.raw_data.insert(key.to_string(), value.into());
        self
    }
}

/// Priority of a listing, derived from its price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    High,
    Normal,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Priority::Urgent => "🔥 URGENT - GREAT DEAL!",
            Priority::High => "⭐ HIGH PRIORITY",
            Priority::Normal => "✓ Within Budget",
        }
    }

    /// Embed colour (RGB).
    pub fn color(&self) -> u32 {
        match self {
            Priority::Urgent => 0xFF0000,
            Priority::High => 0xFFA500,
            Priority::Normal => 0x00FF00,
        }
    }
}

/// Price boundaries between priority buckets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriorityThresholds {
    /// Prices strictly below this are urgent
    #[serde(default = "default_urgent_below")]
    pub urgent_below: u32,

    /// Prices strictly below this (and not urgent) are high
    #[serde(default = "default_high_below")]
    pub high_below: u32,
}

fn default_urgent_below() -> u32 {
    7000
}

fn default_high_below() -> u32 {
    9000
}

impl Default for PriorityThresholds {
    fn default() -> Self {
        Self {
            urgent_below: default_urgent_below(),
            high_below: default_high_below(),
        }
    }
}

impl PriorityThresholds {
    pub fn classify(&self, price: u32) -> Priority {
        if price < self.urgent_below {
            Priority::Urgent
        } else if price < self.high_below {
            Priority::High
        } else {
            Priority::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ListingRecord {
        ListingRecord::new("a1", "https://example.com/property/a1", "2BHK Flat", 8000)
    }

    #[test]
    fn test_validate_accepts_absolute_url() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_id() {
        let mut record = sample();
        record.id = "  ".into();
        assert!(matches!(record.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_relative_url() {
        let mut record = sample();
        record.url = "/property/a1".into();
        assert!(record.validate().is_err());

        record.url = "mailto:someone@example.com".into();
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_priority_buckets() {
        let t = PriorityThresholds::default();
        assert_eq!(t.classify(6999), Priority::Urgent);
        assert_eq!(t.classify(7000), Priority::High);
        assert_eq!(t.classify(8999), Priority::High);
        assert_eq!(t.classify(9000), Priority::Normal);
        assert_eq!(t.classify(15000), Priority::Normal);
    }

    #[test]
    fn test_priority_thresholds_are_configurable() {
        let t = PriorityThresholds {
            urgent_below: 20000,
            high_below: 30000,
        };
        assert_eq!(sample().priority(&t), Priority::Urgent);
    }

    #[test]
    fn test_posted_label() {
        let mut record = sample();
        assert_eq!(record.posted_label(), None);

        record.posted_minutes_ago = Some(40);
        assert_eq!(record.posted_label().as_deref(), Some("40 minutes ago"));
        record.posted_minutes_ago = Some(60);
        assert_eq!(record.posted_label().as_deref(), Some("1 hour ago"));
        record.posted_minutes_ago = Some(150);
        assert_eq!(record.posted_label().as_deref(), Some("2 hours ago"));
        record.posted_minutes_ago = Some(3 * 1440);
        assert_eq!(record.posted_label().as_deref(), Some("3 days ago"));
    }

    #[test]
    fn test_unknown_amenities_deserialize_as_none() {
        let json = r#"{"id":"x","url":"https://e.com/x","title":"t","address":"Unknown","price":5}"#;
        let record: ListingRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.bedrooms, None);
        assert_eq!(record.posted_minutes_ago, None);
        assert!(record.raw_data.is_empty());
    }
}
