// src/utils/http.rs

//! HTTP client utilities shared by the source adapters.

use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode};

use crate::error::{Result, ScrapeError};
use crate::models::HttpConfig;

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Page fetcher with rotating User-Agent and retry on transient failures.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    user_agents: Vec<String>,
    max_retries: u32,
    request_delay: Duration,
    max_concurrent: usize,
}

impl Fetcher {
    /// Create a fetcher from HTTP settings.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .default_headers(default_headers())
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            user_agents: config
                .user_agents
                .iter()
                .filter(|ua| !ua.trim().is_empty())
                .cloned()
                .collect(),
            max_retries: config.max_retries.max(1),
            request_delay: Duration::from_millis(config.request_delay_ms),
            max_concurrent: config.max_concurrent.max(1),
        })
    }

    /// Pause between consecutive requests to the same site.
    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    /// Upper bound on in-flight requests per adapter.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    fn user_agent(&self) -> Option<String> {
        self.user_agents.choose(&mut rand::thread_rng()).cloned()
    }

    /// Fetch a page body, retrying network failures with exponential backoff.
    pub async fn fetch_text(&self, url: &str) -> std::result::Result<String, ScrapeError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let wait = Duration::from_secs(1 << (attempt - 1).min(5));
                    log::warn!(
                        "Fetch of {} failed (attempt {}/{}): {}. Retrying in {}s",
                        url,
                        attempt,
                        self.max_retries,
                        e,
                        wait.as_secs()
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<String, ScrapeError> {
        let mut request = self.client.get(url);
        if let Some(ua) = self.user_agent() {
            request = request.header(reqwest::header::USER_AGENT, ua);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ScrapeError::network(url, e))?;

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(err) = check_status(url, response.status(), retry_after.as_deref()) {
            return Err(err);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScrapeError::network(url, e))?;
        log::debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body)
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert("DNT", HeaderValue::from_static("1"));
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    headers
}

/// Map a response status onto the scrape error taxonomy.
pub fn check_status(
    url: &str,
    status: StatusCode,
    retry_after: Option<&str>,
) -> Option<ScrapeError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::NOT_FOUND => ScrapeError::NotFound {
            url: url.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => ScrapeError::RateLimited {
            url: url.to_string(),
            retry_after_secs: retry_after
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        other => ScrapeError::network(url, format!("HTTP status {other}")),
    })
}
