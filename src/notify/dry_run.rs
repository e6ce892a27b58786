//! Sink that only writes listings to the log.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ListingRecord, PriorityThresholds};
use crate::notify::NotificationSink;

/// Logs each listing and reports success. Used for dry runs and when no
/// webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    thresholds: PriorityThresholds,
}

impl LogNotifier {
    pub fn new(thresholds: PriorityThresholds) -> Self {
        Self { thresholds }
    }
}

#[async_trait]
impl NotificationSink for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, record: &ListingRecord) -> Result<bool> {
        log::info!(
            "[{}] {} | Rs {}/month | {} | {}",
            record.priority(&self.thresholds).label(),
            record.title,
            record.price,
            record.address,
            record.url
        );
        Ok(true)
    }

    async fn send_test_message(&self) -> Result<bool> {
        log::info!("Log notifier test message");
        Ok(true)
    }
}
