// src/pipeline/decision.rs

//! Notification gates: budget, novelty, recency.

use crate::error::Result;
use crate::models::{Config, ListingRecord, Novelty, UnknownAgePolicy};
use crate::storage::Storage;

/// The slice of configuration the cycle decisions depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorPolicy {
    pub max_price: u32,
    pub time_window_hours: u32,
    pub unknown_age: UnknownAgePolicy,
}

impl MonitorPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_price: config.monitor.max_price,
            time_window_hours: config.monitor.time_window_hours,
            unknown_age: config.monitor.unknown_age,
        }
    }

    pub fn within_budget(&self, record: &ListingRecord) -> bool {
        record.price <= self.max_price
    }

    /// Whether the listing was posted inside the time window.
    ///
    /// A listing of unknown age counts as recent unless the policy says
    /// otherwise.
    pub fn is_recent(&self, record: &ListingRecord) -> bool {
        match record.posted_minutes_ago {
            Some(minutes) => u64::from(minutes) <= u64::from(self.time_window_hours) * 60,
            None => self.unknown_age == UnknownAgePolicy::Notify,
        }
    }
}

/// Outcome of the notification gates for one steady-state listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Priced above the budget; the store was not consulted
    OverBudget,
    /// Already stored at this price
    NotNovel,
    /// Novel but outside the time window (or of unknown age under `Skip`)
    TooOld {
        minutes: Option<u32>,
        novelty: Novelty,
    },
    /// Passed every gate
    Notify { novelty: Novelty },
}

impl Decision {
    pub fn should_notify(&self) -> bool {
        matches!(self, Decision::Notify { .. })
    }

    /// Whether the store must be updated for this listing.
    ///
    /// Over-budget listings are resolved by the caller, which checks
    /// whether the id is already tracked.
    pub fn is_novel(&self) -> bool {
        matches!(self, Decision::TooOld { .. } | Decision::Notify { .. })
    }
}

/// Run the gates in order, cheapest first. The store is queried at most once.
pub async fn decide<S>(policy: &MonitorPolicy, storage: &S, record: &ListingRecord) -> Result<Decision>
where
    S: Storage + ?Sized,
{
    if !policy.within_budget(record) {
        return Ok(Decision::OverBudget);
    }

    let novelty = storage.novelty(record).await?;
    if !novelty.is_novel() {
        return Ok(Decision::NotNovel);
    }

    if !policy.is_recent(record) {
        return Ok(Decision::TooOld {
            minutes: record.posted_minutes_ago,
            novelty,
        });
    }

    Ok(Decision::Notify { novelty })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn policy() -> MonitorPolicy {
        MonitorPolicy {
            max_price: 10_000,
            time_window_hours: 24,
            unknown_age: UnknownAgePolicy::Notify,
        }
    }

    fn listing(id: &str, price: u32, minutes: Option<u32>) -> ListingRecord {
        let mut record =
            ListingRecord::new(id, format!("https://example.com/{id}"), "Flat", price);
        record.posted_minutes_ago = minutes;
        record
    }

    #[test]
    fn test_budget_is_inclusive() {
        let p = policy();
        assert!(p.within_budget(&listing("a", 10_000, None)));
        assert!(!p.within_budget(&listing("a", 10_001, None)));
    }

    #[test]
    fn test_recency_window() {
        let p = policy();
        assert!(p.is_recent(&listing("a", 1, Some(24 * 60))));
        assert!(!p.is_recent(&listing("a", 1, Some(24 * 60 + 1))));
        assert!(p.is_recent(&listing("a", 1, None)));

        let strict = MonitorPolicy {
            unknown_age: UnknownAgePolicy::Skip,
            ..p
        };
        assert!(!strict.is_recent(&listing("a", 1, None)));
    }

    #[tokio::test]
    async fn test_decide_order() {
        let stored = listing("known", 8000, None);
        let storage = MemoryStorage::seeded(&[stored]);
        let p = policy();

        assert_eq!(
            decide(&p, &storage, &listing("x", 20_000, Some(5))).await.unwrap(),
            Decision::OverBudget
        );
        assert_eq!(
            decide(&p, &storage, &listing("known", 8000, Some(5))).await.unwrap(),
            Decision::NotNovel
        );
        assert_eq!(
            decide(&p, &storage, &listing("known", 7000, Some(5))).await.unwrap(),
            Decision::Notify {
                novelty: Novelty::PriceChanged { previous: 8000 }
            }
        );
        assert_eq!(
            decide(&p, &storage, &listing("new", 9000, Some(3000))).await.unwrap(),
            Decision::TooOld {
                minutes: Some(3000),
                novelty: Novelty::New
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_age_with_tiny_window_notifies() {
        let storage = MemoryStorage::new();
        let p = MonitorPolicy {
            time_window_hours: 1,
            ..policy()
        };
        let decision = decide(&p, &storage, &listing("n", 5000, None)).await.unwrap();
        assert!(decision.should_notify());
    }
}
