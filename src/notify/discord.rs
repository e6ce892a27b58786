//! Discord webhook notifier.
//!
//! Discord allows roughly 30 webhook calls per minute. The notifier keeps a
//! sliding window of recent sends and waits before exceeding the configured
//! rate. A 429 response is honoured with a capped wait; other failures are
//! retried with exponential backoff up to `max_retries` attempts.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::{DiscordConfig, ListingRecord, PriorityThresholds};
use crate::notify::NotificationSink;

const RATE_WINDOW: Duration = Duration::from_secs(60);
const FOOTER: &str = "Property Monitor";

/// Sliding-window limiter over the last minute of sends.
#[derive(Debug)]
struct RateLimiter {
    limit: usize,
    sent: VecDeque<Instant>,
}

impl RateLimiter {
    fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            sent: VecDeque::with_capacity(limit),
        }
    }

    /// Time to wait before the next send is allowed.
    fn wait_time(&mut self, now: Instant) -> Option<Duration> {
        while let Some(&oldest) = self.sent.front() {
            if now.duration_since(oldest) >= RATE_WINDOW {
                self.sent.pop_front();
            } else {
                break;
            }
        }

        if self.sent.len() < self.limit {
            return None;
        }
        let oldest = *self.sent.front()?;
        Some(RATE_WINDOW.saturating_sub(now.duration_since(oldest)))
    }

    fn record(&mut self, now: Instant) {
        self.sent.push_back(now);
        while self.sent.len() > self.limit {
            self.sent.pop_front();
        }
    }
}

/// Sends listings as rich embeds to a Discord webhook.
#[derive(Debug)]
pub struct DiscordNotifier {
    webhook_url: String,
    client: Client,
    config: DiscordConfig,
    thresholds: PriorityThresholds,
    max_price: u32,
    limiter: Mutex<RateLimiter>,
}

impl DiscordNotifier {
    /// Create a notifier for `webhook_url`.
    pub fn new(
        webhook_url: impl Into<String>,
        config: DiscordConfig,
        thresholds: PriorityThresholds,
        max_price: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let limit = config.rate_limit_per_minute.min(30) as usize;

        Ok(Self {
            webhook_url: webhook_url.into(),
            client,
            config,
            thresholds,
            max_price,
            limiter: Mutex::new(RateLimiter::new(limit)),
        })
    }

    /// Build the embed payload for a listing.
    pub fn build_embed(record: &ListingRecord, thresholds: &PriorityThresholds) -> Value {
        let priority = record.priority(thresholds);

        let mut fields = vec![
            json!({ "name": "💰 Price", "value": format!("Rs {}/Month", format_price(record.price)), "inline": true }),
            json!({ "name": "📍 Location", "value": truncate(&record.address, 1024), "inline": false }),
        ];
        if let Some(bedrooms) = record.bedrooms {
            fields.push(json!({ "name": "🛏️ Bedrooms", "value": bedrooms.to_string(), "inline": true }));
        }
        if let Some(bathrooms) = record.bathrooms {
            fields.push(json!({ "name": "🚿 Bathrooms", "value": bathrooms.to_string(), "inline": true }));
        }
        if let Some(kind) = record.property_type.as_deref().filter(|k| !k.is_empty()) {
            fields.push(json!({ "name": "🏠 Type", "value": truncate(kind, 1024), "inline": true }));
        }
        if let Some(posted) = record.posted_label() {
            fields.push(json!({ "name": "🕐 Posted", "value": posted, "inline": true }));
        }

        json!({
            "title": "🏠 NEW PROPERTY FOUND!",
            "description": format!("**{}**\n\n{}", truncate(&record.title, 256), priority.label()),
            "url": record.url,
            "color": priority.color(),
            "fields": fields,
            "footer": { "text": FOOTER },
            "timestamp": Utc::now().to_rfc3339(),
        })
    }

    fn test_embed(&self) -> Value {
        json!({
            "title": "✅ Property Monitor - Test Notification",
            "description": "Your Discord webhook is configured correctly!\n\nThe monitor will post here when new listings within budget are found.",
            "color": 0x00FF00,
            "fields": [
                { "name": "Status", "value": "🟢 Operational", "inline": true },
                { "name": "Budget Filter", "value": format!("≤ Rs {}/month", format_price(self.max_price)), "inline": true },
            ],
            "footer": { "text": FOOTER },
            "timestamp": Utc::now().to_rfc3339(),
        })
    }

    async fn wait_for_slot(&self) {
        let wait = self.limiter.lock().await.wait_time(Instant::now());
        if let Some(wait) = wait {
            log::warn!("Discord rate limit reached, sleeping {:.1}s", wait.as_secs_f64());
            tokio::time::sleep(wait).await;
        }
    }

    /// Post one embed, retrying within the configured bounds.
    async fn send_embed(&self, embed: Value) -> Result<bool> {
        self.wait_for_slot().await;

        let payload = json!({ "embeds": [embed] });
        let attempts = self.config.max_retries.max(1);
        let max_wait = Duration::from_secs(self.config.max_retry_after_secs);

        for attempt in 0..attempts {
            let last = attempt + 1 == attempts;

            match self.client.post(&self.webhook_url).json(&payload).send().await {
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = retry_after(&resp).min(max_wait);
                    log::warn!(
                        "Discord rate limited (attempt {}), retrying after {:.1}s",
                        attempt + 1,
                        retry_after.as_secs_f64()
                    );
                    if !last {
                        tokio::time::sleep(retry_after).await;
                    }
                }
                Ok(resp) if resp.status().is_success() => {
                    self.limiter.lock().await.record(Instant::now());
                    return Ok(true);
                }
                Ok(resp) => {
                    log::error!(
                        "Discord webhook returned {} (attempt {})",
                        resp.status(),
                        attempt + 1
                    );
                    if last {
                        return Ok(false);
                    }
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(e) => {
                    log::error!("Discord request failed (attempt {}): {}", attempt + 1, e);
                    if last {
                        return Err(AppError::notify("discord", e));
                    }
                    tokio::time::sleep(backoff(attempt)).await;
                }
            }
        }

        Ok(false)
    }
}

#[async_trait]
impl NotificationSink for DiscordNotifier {
    fn name(&self) -> &str {
        "discord"
    }

    async fn notify(&self, record: &ListingRecord) -> Result<bool> {
        let embed = Self::build_embed(record, &self.thresholds);
        self.send_embed(embed).await
    }

    async fn send_test_message(&self) -> Result<bool> {
        let sent = self.send_embed(self.test_embed()).await?;
        if sent {
            log::info!("Discord test message sent");
        } else {
            log::error!("Discord test message failed");
        }
        Ok(sent)
    }
}

/// Wait requested by Discord, defaulting to one second.
fn retry_after(resp: &reqwest::Response) -> Duration {
    resp.headers()
        .get("X-RateLimit-Reset-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(Duration::from_secs(1))
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.min(4))
}

/// Format with thousands separators: 105000 -> "105,000".
fn format_price(price: u32) -> String {
    let digits = price.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
