//! Notification sinks.
//!
//! A sink delivers one listing at a time on a best-effort basis. Retries,
//! backoff and rate limiting live inside the sink and finish within a
//! bounded time, so a slow sink delays a cycle but never stalls it.

pub mod discord;
pub mod dry_run;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Config, ListingRecord};

pub use discord::DiscordNotifier;
pub use dry_run::LogNotifier;

/// Trait for notification backends.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Deliver one listing.
    ///
    /// `Ok(true)` means delivery was confirmed, `Ok(false)` that the
    /// destination rejected it, `Err` a transport failure.
    async fn notify(&self, record: &ListingRecord) -> Result<bool>;

    /// Send a fixed message to check the sink is wired up.
    async fn send_test_message(&self) -> Result<bool>;
}

/// Discord when a webhook is configured, otherwise the log.
pub fn build_notifier(config: &Config) -> Result<Box<dyn NotificationSink>> {
    match config
        .discord
        .webhook_url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
    {
        Some(url) => Ok(Box::new(DiscordNotifier::new(
            url,
            config.discord.clone(),
            config.priority.clone(),
            config.monitor.max_price,
        )?)),
        None => {
            log::warn!("No Discord webhook configured; listings will only be logged");
            Ok(Box::new(LogNotifier::new(config.priority.clone())))
        }
    }
}

#[async_trait]
impl<T: NotificationSink + ?Sized> NotificationSink for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn notify(&self, record: &ListingRecord) -> Result<bool> {
        (**self).notify(record).await
    }

    async fn send_test_message(&self) -> Result<bool> {
        (**self).send_test_message().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_notifier_falls_back_to_log() {
        let mut config = Config::default();
        assert_eq!(build_notifier(&config).unwrap().name(), "log");

        config.discord.webhook_url = Some("https://discord.com/api/webhooks/1/abc".into());
        assert_eq!(build_notifier(&config).unwrap().name(), "discord");
    }
}
