// src/config.rs

//! Configuration loading utilities.
//!
//! Settings come from an optional TOML file, then `PROPMON_*` environment
//! variables (a `.env` file is honoured) override individual fields.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AppError, Result};
use crate::models::Config;

/// Prefix shared by all environment overrides.
pub const ENV_PREFIX: &str = "PROPMON_";

/// Load configuration from `path` and the process environment, then validate it.
///
/// A missing file is not an error: defaults are used. A file that exists but
/// does not parse is.
pub fn load_config(path: &Path) -> Result<Config> {
    if let Ok(dotenv) = dotenvy::dotenv() {
        log::debug!("Loaded environment from {}", dotenv.display());
    }

    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        log::warn!("No config file at {}. Using defaults.", path.display());
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Apply `PROPMON_*` overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| {
        lookup(&format!("{ENV_PREFIX}{name}"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(v) = var("MAX_PRICE") {
        config.monitor.max_price = parse_var("MAX_PRICE", &v)?;
    }
    if let Some(v) = var("TIME_WINDOW_HOURS") {
        config.monitor.time_window_hours = parse_var("TIME_WINDOW_HOURS", &v)?;
    }
    if let Some(v) = var("SCRAPE_INTERVAL_SECONDS") {
        config.monitor.interval_secs = parse_var("SCRAPE_INTERVAL_SECONDS", &v)?;
    }
    if let Some(v) = var("MAX_RETRIES") {
        config.http.max_retries = parse_var("MAX_RETRIES", &v)?;
    }
    if let Some(v) = var("REQUEST_TIMEOUT") {
        let secs: f64 = parse_var("REQUEST_TIMEOUT", &v)?;
        config.http.timeout_secs = secs.ceil() as u64;
    }
    if let Some(v) = var("DATA_DIR") {
        config.storage.data_dir = PathBuf::from(v);
    }
    if let Some(v) = var("BACKUP_ENABLED") {
        config.storage.backup_enabled = parse_bool("BACKUP_ENABLED", &v)?;
    }
    if let Some(v) = var("BACKUP_RETENTION_DAYS") {
        config.storage.backup_retention_days = parse_var("BACKUP_RETENTION_DAYS", &v)?;
    }
    if let Some(v) = var("DISCORD_WEBHOOK_URL") {
        config.discord.webhook_url = Some(v);
    }
    if let Some(v) = var("DISCORD_RATE_LIMIT_PER_MINUTE") {
        config.discord.rate_limit_per_minute = parse_var("DISCORD_RATE_LIMIT_PER_MINUTE", &v)?;
    }
    if let Some(v) = var("PROPERTY_URLS") {
        config.sources.nepal_bazaar.urls = parse_url_list(&v);
    }
    if let Some(v) = var("LOG_LEVEL") {
        config.logging.level = v.to_lowercase();
    }

    Ok(())
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| AppError::config(format!("{ENV_PREFIX}{name}={value}: {e}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::config(format!(
            "{ENV_PREFIX}{name}={value}: expected a boolean"
        ))),
    }
}

/// Accept either a JSON array of URLs or a single bare URL.
fn parse_url_list(value: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(value) {
        Ok(urls) => urls,
        Err(_) => vec![value.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_overrides_numeric_fields() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("PROPMON_MAX_PRICE", "15000"),
                ("PROPMON_TIME_WINDOW_HOURS", "48"),
                ("PROPMON_REQUEST_TIMEOUT", "12.5"),
            ]),
        )
        .unwrap();

        assert_eq!(config.monitor.max_price, 15000);
        assert_eq!(config.monitor.time_window_hours, 48);
        assert_eq!(config.http.timeout_secs, 13);
    }

    #[test]
    fn test_malformed_number_is_config_error() {
        let mut config = Config::default();
        let result = apply_env_overrides(&mut config, env(&[("PROPMON_MAX_PRICE", "lots")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_property_urls_json_or_single() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[(
                "PROPMON_PROPERTY_URLS",
                r#"["https://a.example/rent","https://b.example/rent"]"#,
            )]),
        )
        .unwrap();
        assert_eq!(config.sources.nepal_bazaar.urls.len(), 2);

        apply_env_overrides(
            &mut config,
            env(&[("PROPMON_PROPERTY_URLS", "https://c.example/rent")]),
        )
        .unwrap();
        assert_eq!(
            config.sources.nepal_bazaar.urls,
            vec!["https://c.example/rent".to_string()]
        );
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[("PROPMON_DISCORD_WEBHOOK_URL", "   "), ("PROPMON_BACKUP_ENABLED", "no")]),
        )
        .unwrap();
        assert!(config.discord.webhook_url.is_none());
        assert!(!config.storage.backup_enabled);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.monitor.interval_secs, 900);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[monitor\nmax_price = ").unwrap();
        assert!(matches!(load_config(&path), Err(AppError::Toml(_))));
    }
}
