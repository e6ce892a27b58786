//! Per-cycle statistics.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Aggregate of one monitoring cycle. Reported, never persisted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CycleStats {
    pub started_at: DateTime<Utc>,

    /// Whether the cycle ran in baseline mode
    pub baseline: bool,

    /// Listings returned by all succeeding adapters
    pub total_listings: usize,

    /// Listings that passed every notification gate
    pub new_listings: usize,

    /// Listings priced at or below the budget
    pub within_budget: usize,

    pub notifications_sent: usize,

    /// Adapter failures, failed notifications and rejected records
    pub errors: usize,

    pub duration: Duration,
}

impl CycleStats {
    pub fn start(baseline: bool) -> Self {
        Self {
            started_at: Utc::now(),
            baseline,
            total_listings: 0,
            new_listings: 0,
            within_budget: 0,
            notifications_sent: 0,
            errors: 0,
            duration: Duration::ZERO,
        }
    }
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Total: {} | New: {} | Budget: {} | Notifications: {} | Errors: {} | Duration: {}ms",
            if self.baseline { "[baseline] " } else { "" },
            self.total_listings,
            self.new_listings,
            self.within_budget,
            self.notifications_sent,
            self.errors,
            self.duration.as_millis()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_summary() {
        let mut stats = CycleStats::start(false);
        stats.total_listings = 12;
        stats.new_listings = 2;
        stats.within_budget = 5;
        stats.notifications_sent = 2;
        stats.duration = Duration::from_millis(1530);

        assert_eq!(
            stats.to_string(),
            "Total: 12 | New: 2 | Budget: 5 | Notifications: 2 | Errors: 0 | Duration: 1530ms"
        );
    }

    #[test]
    fn test_display_marks_baseline() {
        let stats = CycleStats::start(true);
        assert!(stats.to_string().starts_with("[baseline] Total: 0"));
    }
}
