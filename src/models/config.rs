//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::PriorityThresholds;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Budget, recency window and cycle cadence
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Price buckets for presentation
    #[serde(default)]
    pub priority: PriorityThresholds,

    /// HTTP behavior shared by all source adapters
    #[serde(default)]
    pub http: HttpConfig,

    /// State file location and backups
    #[serde(default)]
    pub storage: StorageConfig,

    /// Discord webhook sink
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Which listing sites to poll
    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if !(60..=3600).contains(&self.monitor.interval_secs) {
            return Err(AppError::validation(
                "monitor.interval_secs must be between 60 and 3600",
            ));
        }
        if !(0.0..0.5).contains(&self.monitor.interval_jitter) {
            return Err(AppError::validation(
                "monitor.interval_jitter must be in [0, 0.5)",
            ));
        }
        if !(1..=168).contains(&self.monitor.time_window_hours) {
            return Err(AppError::validation(
                "monitor.time_window_hours must be between 1 and 168",
            ));
        }
        if self.priority.urgent_below > self.priority.high_below {
            return Err(AppError::validation(
                "priority.urgent_below must not exceed priority.high_below",
            ));
        }
        if !(1..=10).contains(&self.http.max_retries) {
            return Err(AppError::validation("http.max_retries must be between 1 and 10"));
        }
        if !(5..=120).contains(&self.http.timeout_secs) {
            return Err(AppError::validation(
                "http.timeout_secs must be between 5 and 120",
            ));
        }
        if self.http.max_concurrent == 0 {
            return Err(AppError::validation("http.max_concurrent must be > 0"));
        }
        if self.http.user_agents.iter().all(|ua| ua.trim().is_empty()) {
            return Err(AppError::validation("http.user_agents is empty"));
        }
        if !(1..=365).contains(&self.storage.backup_retention_days) {
            return Err(AppError::validation(
                "storage.backup_retention_days must be between 1 and 365",
            ));
        }
        if self.storage.backup_every_cycles == 0 {
            return Err(AppError::validation(
                "storage.backup_every_cycles must be > 0",
            ));
        }
        if !(1..=30).contains(&self.discord.rate_limit_per_minute) {
            return Err(AppError::validation(
                "discord.rate_limit_per_minute must be between 1 and 30",
            ));
        }
        if self.discord.timeout_secs == 0 {
            return Err(AppError::validation("discord.timeout_secs must be > 0"));
        }
        if self.discord.max_retries == 0 {
            return Err(AppError::validation("discord.max_retries must be > 0"));
        }
        if let Some(url) = &self.discord.webhook_url {
            url::Url::parse(url)
                .map_err(|e| AppError::validation(format!("discord.webhook_url: {e}")))?;
        }
        for (name, site) in [
            ("erental", &self.sources.erental),
            ("kotha_bhada", &self.sources.kotha_bhada),
        ] {
            if site.enabled {
                url::Url::parse(&site.url)
                    .map_err(|e| AppError::validation(format!("sources.{name}.url: {e}")))?;
            }
        }
        for url in &self.sources.nepal_bazaar.urls {
            url::Url::parse(url)
                .map_err(|e| AppError::validation(format!("sources.nepal_bazaar url {url}: {e}")))?;
        }
        Ok(())
    }

    /// Path of the listing state file.
    pub fn state_path(&self) -> PathBuf {
        self.storage.data_dir.join("state.json")
    }
}

/// What to do with listings whose age could not be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnknownAgePolicy {
    /// Treat as recent
    #[default]
    Notify,
    /// Treat as too old
    Skip,
}

/// Monitoring cycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Maximum monthly rent that can trigger a notification
    #[serde(default = "defaults::max_price")]
    pub max_price: u32,

    /// Listings older than this are not announced
    #[serde(default = "defaults::time_window_hours")]
    pub time_window_hours: u32,

    /// Seconds between cycle starts
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Relative random spread applied to the interval (0.07 = ±7%)
    #[serde(default = "defaults::jitter")]
    pub interval_jitter: f64,

    #[serde(default)]
    pub unknown_age: UnknownAgePolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_price: defaults::max_price(),
            time_window_hours: defaults::time_window_hours(),
            interval_secs: defaults::interval(),
            interval_jitter: defaults::jitter(),
            unknown_age: UnknownAgePolicy::default(),
        }
    }
}

/// HTTP client settings for scraping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent headers picked at random per request
    #[serde(default = "defaults::user_agents")]
    pub user_agents: Vec<String>,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts per page for transient failures
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Delay between detail page requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum concurrent detail page requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agents: defaults::user_agents(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::max_retries(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Listing state persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "defaults::enabled")]
    pub backup_enabled: bool,

    #[serde(default = "defaults::backup_retention_days")]
    pub backup_retention_days: u32,

    /// Take a backup every N cycles of the run loop
    #[serde(default = "defaults::backup_every_cycles")]
    pub backup_every_cycles: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            backup_enabled: defaults::enabled(),
            backup_retention_days: defaults::backup_retention_days(),
            backup_every_cycles: defaults::backup_every_cycles(),
        }
    }
}

/// Discord webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Webhook URL; usually supplied through `PROPMON_DISCORD_WEBHOOK_URL`
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "defaults::rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,

    #[serde(default = "defaults::webhook_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Upper bound on a single server-requested wait
    #[serde(default = "defaults::max_retry_after")]
    pub max_retry_after_secs: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            rate_limit_per_minute: defaults::rate_limit_per_minute(),
            timeout_secs: defaults::webhook_timeout(),
            max_retries: defaults::max_retries(),
            max_retry_after_secs: defaults::max_retry_after(),
        }
    }
}

/// Listing sites to poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub nepal_bazaar: NepalBazaarConfig,

    #[serde(default = "defaults::erental")]
    pub erental: SiteConfig,

    #[serde(default = "defaults::kotha_bhada")]
    pub kotha_bhada: SiteConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            nepal_bazaar: NepalBazaarConfig::default(),
            erental: defaults::erental(),
            kotha_bhada: defaults::kotha_bhada(),
        }
    }
}

/// Search result pages on nepalpropertybazaar.com, one adapter per URL.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NepalBazaarConfig {
    #[serde(default)]
    pub urls: Vec<String>,
}

/// A site with a single fixed listing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub url: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::SiteConfig;

    // Monitor defaults
    pub fn max_price() -> u32 {
        10_000
    }
    pub fn time_window_hours() -> u32 {
        24
    }
    pub fn interval() -> u64 {
        900
    }
    pub fn jitter() -> f64 {
        0.07
    }

    // HTTP defaults
    pub fn user_agents() -> Vec<String> {
        vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into(),
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into(),
        ]
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn request_delay() -> u64 {
        250
    }
    pub fn max_concurrent() -> usize {
        4
    }

    // Storage defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("./data")
    }
    pub fn enabled() -> bool {
        true
    }
    pub fn backup_retention_days() -> u32 {
        7
    }
    pub fn backup_every_cycles() -> u64 {
        10
    }

    // Discord defaults
    pub fn rate_limit_per_minute() -> u32 {
        25
    }
    pub fn webhook_timeout() -> u64 {
        10
    }
    pub fn max_retry_after() -> u64 {
        5
    }

    // Source defaults
    pub fn erental() -> SiteConfig {
        SiteConfig {
            enabled: true,
            url: "https://erentalservice.com/property/".into(),
        }
    }
    pub fn kotha_bhada() -> SiteConfig {
        SiteConfig {
            enabled: true,
            url: "https://kothabhada.com/latest-properties?order=latest".into(),
        }
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [monitor]
            max_price = 12000

            [sources.nepal_bazaar]
            urls = ["https://nepalpropertybazaar.com/search?type=rent"]
            "#,
        )
        .unwrap();

        assert_eq!(config.monitor.max_price, 12000);
        assert_eq!(config.monitor.time_window_hours, 24);
        assert_eq!(config.monitor.unknown_age, UnknownAgePolicy::Notify);
        assert_eq!(config.priority.urgent_below, 7000);
        assert_eq!(config.sources.nepal_bazaar.urls.len(), 1);
        assert!(config.sources.erental.enabled);
        assert!(config.sources.kotha_bhada.url.starts_with("https://kothabhada.com"));
    }

    #[test]
    fn unknown_age_policy_parses_lowercase() {
        let config: Config = toml::from_str("[monitor]\nunknown_age = \"skip\"\n").unwrap();
        assert_eq!(config.monitor.unknown_age, UnknownAgePolicy::Skip);
    }

    #[test]
    fn validate_rejects_short_interval() {
        let mut config = Config::default();
        config.monitor.interval_secs = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_wide_time_window() {
        let mut config = Config::default();
        config.monitor.time_window_hours = 169;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_priority_thresholds() {
        let mut config = Config::default();
        config.priority.urgent_below = 10_000;
        config.priority.high_below = 9_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_discord_rate_above_cap() {
        let mut config = Config::default();
        config.discord.rate_limit_per_minute = 31;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_enabled_site_without_url() {
        let config: Config = toml::from_str("[sources.erental]\nenabled = true\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[sources.erental]\nenabled = false\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn state_path_is_under_data_dir() {
        let mut config = Config::default();
        config.storage.data_dir = PathBuf::from("/tmp/monitor");
        assert_eq!(config.state_path(), PathBuf::from("/tmp/monitor/state.json"));
    }

    #[test]
    fn load_or_default_handles_missing_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Config::load_or_default(dir.path().join("missing.toml"));
        assert_eq!(missing.monitor.max_price, 10_000);

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[monitor\nmax_price = ").unwrap();
        assert!(Config::load(&broken).is_err());
        assert_eq!(Config::load_or_default(&broken).monitor.interval_secs, 900);
    }
}
