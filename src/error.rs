// src/error.rs

//! Unified error handling for the monitor.

use std::fmt;

use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// State store failure; fatal for the running cycle
    #[error("Storage error: {0}")]
    Storage(String),

    /// Another cycle holds the lock
    #[error("Lock held at {path}: {message}")]
    Lock { path: String, message: String },

    /// Notification transport failure
    #[error("Notification error for {sink}: {message}")]
    Notify { sink: String, message: String },

    /// Source adapter failure
    #[error(transparent)]
    Scrape(#[from] ScrapeError),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Create a notification error for a named sink.
    pub fn notify(sink: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Notify {
            sink: sink.into(),
            message: message.to_string(),
        }
    }
}

/// Failure of a source adapter to produce any listings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    /// Transport failure or unexpected HTTP status
    #[error("Network error for {url}: {reason}")]
    Network { url: String, reason: String },

    /// Listing page returned 404
    #[error("Page not found: {url}")]
    NotFound { url: String },

    /// The site asked us to back off
    #[error("Rate limited by {url}. Retry after {retry_after_secs} seconds")]
    RateLimited { url: String, retry_after_secs: u64 },

    /// Page fetched but its markup could not be interpreted
    #[error("Parse error for {url}: {reason}")]
    Parse { url: String, reason: String },
}

impl ScrapeError {
    pub fn network(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Parse {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}
