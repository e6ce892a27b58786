// src/services/parse.rs

//! Text helpers shared by the site adapters.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::error::{AppError, Result};
use crate::utils::normalize_whitespace;

const PROPERTY_TYPE_KEYWORDS: [&str; 5] = ["flat", "apartment", "house", "room", "commercial"];

/// Compile a CSS selector.
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Whitespace-normalized text content of an element.
pub fn element_text(el: ElementRef<'_>) -> String {
    normalize_whitespace(&el.text().collect::<String>())
}

/// Text of the first match of `sel` under `el`, if non-empty.
pub fn select_text(el: ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Parse a rent amount such as `Rs15,000`, `Rs. 1,05,000` or `Rs 9500/Month`.
///
/// Reads the first run of digits and grouping commas; anything after it
/// (decimals, units) is ignored.
pub fn parse_price(text: &str) -> Option<u32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

fn age_patterns() -> &'static [(Option<Regex>, u32); 3] {
    static PATTERNS: OnceLock<[(Option<Regex>, u32); 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (Regex::new(r"(\d+)\s*minute").ok(), 1),
            (Regex::new(r"(\d+)\s*hour").ok(), 60),
            (Regex::new(r"(\d+)\s*day").ok(), 1440),
        ]
    })
}

/// Parse relative ages like `40 minutes ago`, `2 hours ago`, `1 day ago` into minutes.
pub fn parse_age_minutes(text: &str) -> Option<u32> {
    let lower = text.trim().to_lowercase();
    age_patterns().iter().find_map(|(re, factor)| {
        let caps = re.as_ref()?.captures(&lower)?;
        let n: u32 = caps.get(1)?.as_str().parse().ok()?;
        n.checked_mul(*factor)
    })
}

/// Minutes elapsed since a `YYYY/MM/DD` date, measured from midnight UTC.
pub fn minutes_since_date(text: &str, now: DateTime<Utc>) -> Option<u32> {
    let date = NaiveDate::parse_from_str(text.trim(), "%Y/%m/%d").ok()?;
    let posted = date.and_hms_opt(0, 0, 0)?.and_utc();
    let minutes = now.signed_duration_since(posted).num_minutes().max(0);
    u32::try_from(minutes).ok()
}

/// Amenity metadata gathered from free-form list items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Amenities {
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<f64>,
    pub property_type: Option<String>,
}

fn amenity_patterns() -> &'static (Option<Regex>, Option<Regex>) {
    static PATTERNS: OnceLock<(Option<Regex>, Option<Regex>)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"(?i)beds?:\s*(\d+)").ok(),
            Regex::new(r"(?i)baths?:\s*(\d+(?:\.\d+)?)").ok(),
        )
    })
}

impl Amenities {
    /// Fold one amenity line (`Beds: 2`, `Baths: 1.5`, `Flat / Apartment`) into the set.
    pub fn absorb(&mut self, text: &str) {
        let (beds, baths) = amenity_patterns();

        if let Some(n) = capture(beds.as_ref(), text).and_then(|v| v.parse().ok()) {
            self.bedrooms = Some(n);
            return;
        }
        if let Some(n) = capture(baths.as_ref(), text).and_then(|v| v.parse().ok()) {
            self.bathrooms = Some(n);
            return;
        }

        let lower = text.to_lowercase();
        if PROPERTY_TYPE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            self.property_type = Some(normalize_whitespace(text));
        }
    }
}

fn capture<'t>(re: Option<&Regex>, text: &'t str) -> Option<&'t str> {
    Some(re?.captures(text)?.get(1)?.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("Rs15,000"), Some(15000));
        assert_eq!(parse_price("Rs. 1,05,000"), Some(105000));
        assert_eq!(parse_price(" Rs 9500 /Month"), Some(9500));
        assert_eq!(parse_price("12000.00"), Some(12000));
        assert_eq!(parse_price("Price on call"), None);
        assert_eq!(parse_price(""), None);
    }

    #[test]
    fn test_parse_age_minutes() {
        assert_eq!(parse_age_minutes("40 minutes ago"), Some(40));
        assert_eq!(parse_age_minutes("1 minute ago"), Some(1));
        assert_eq!(parse_age_minutes("2 Hours ago"), Some(120));
        assert_eq!(parse_age_minutes("1 day ago"), Some(1440));
        assert_eq!(parse_age_minutes("3 days ago"), Some(4320));
        assert_eq!(parse_age_minutes("yesterday"), None);
    }

    #[test]
    fn test_minutes_since_date() {
        let now = Utc.with_ymd_and_hms(2025, 11, 5, 6, 0, 0).unwrap();
        assert_eq!(minutes_since_date("2025/11/05", now), Some(360));
        assert_eq!(minutes_since_date("2025/11/04", now), Some(1440 + 360));
        assert_eq!(minutes_since_date("2025/12/01", now), Some(0));
        assert_eq!(minutes_since_date("04-11-2025", now), None);
    }

    #[test]
    fn test_amenities_absorb() {
        let mut amenities = Amenities::default();
        for line in ["Bed: 2", "Baths: 1.5", "Flat / Apartment", "Parking"] {
            amenities.absorb(line);
        }
        assert_eq!(
            amenities,
            Amenities {
                bedrooms: Some(2),
                bathrooms: Some(1.5),
                property_type: Some("Flat / Apartment".into()),
            }
        );
    }

    #[test]
    fn test_invalid_selector_is_error() {
        assert!(matches!(
            parse_selector("div[[["),
            Err(AppError::Selector { .. })
        ));
    }
}
