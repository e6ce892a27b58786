// src/pipeline/monitor.rs

//! One monitoring cycle.
//!
//! The first cycle against an empty store is a baseline: every listing is
//! recorded and nothing is sent. Later cycles notify for listings that are
//! within budget, new or repriced, and recent enough.
//!
//! Adapter and notification failures are counted and logged; only store
//! failures abort a cycle.

use std::time::Instant;

use crate::error::Result;
use crate::models::{CycleStats, ListingRecord};
use crate::notify::NotificationSink;
use crate::pipeline::decision::{Decision, MonitorPolicy, decide};
use crate::services::SourceAdapter;
use crate::storage::Storage;

/// Drives cycles against a store and a notification sink.
pub struct Monitor<S, N> {
    storage: S,
    notifier: N,
    policy: MonitorPolicy,
}

impl<S: Storage, N: NotificationSink> Monitor<S, N> {
    pub fn new(storage: S, notifier: N, policy: MonitorPolicy) -> Self {
        Self {
            storage,
            notifier,
            policy,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn policy(&self) -> &MonitorPolicy {
        &self.policy
    }

    /// Run one cycle over `sources`, in the given order.
    pub async fn run_cycle(&self, sources: &[Box<dyn SourceAdapter>]) -> Result<CycleStats> {
        let started = Instant::now();
        let baseline = !self.storage.is_initialized().await?;
        let mut stats = CycleStats::start(baseline);

        if baseline {
            log::info!("Baseline run: recording current listings without notifying");
        }

        for source in sources {
            let listings = match source.scrape().await {
                Ok(listings) => listings,
                Err(e) => {
                    stats.errors += 1;
                    log::error!("Source {} failed: {}", source.name(), e);
                    continue;
                }
            };
            if listings.is_empty() {
                log::warn!("Source {} returned no listings", source.name());
            }
            stats.total_listings += listings.len();

            for record in &listings {
                self.process(source.name(), record, baseline, &mut stats)
                    .await?;
            }
        }

        if baseline {
            self.storage.set_initialized().await?;
            let count = self.storage.get_property_count().await?;
            log::info!("Baseline complete: {} listings recorded", count);
        }

        stats.duration = started.elapsed();
        log::info!("Cycle complete. {}", stats);
        Ok(stats)
    }

    async fn process(
        &self,
        source: &str,
        record: &ListingRecord,
        baseline: bool,
        stats: &mut CycleStats,
    ) -> Result<()> {
        if let Err(e) = record.validate() {
            stats.errors += 1;
            log::error!("Dropping malformed listing from {}: {} ({:?})", source, e, record);
            return Ok(());
        }

        if self.policy.within_budget(record) {
            stats.within_budget += 1;
        }

        if baseline {
            return self.storage.save(record).await;
        }

        match decide(&self.policy, &self.storage, record).await? {
            Decision::OverBudget => {
                // Keep tracked rows current without treating the listing as a candidate.
                if let Some(stored) = self.storage.get(&record.id).await? {
                    if stored.record.price != record.price {
                        self.storage.save(record).await?;
                    }
                }
            }
            Decision::NotNovel => {}
            Decision::TooOld { minutes, .. } => {
                match minutes {
                    Some(m) => log::info!(
                        "Skipping {} ({}): posted {} minutes ago, outside the {}h window",
                        record.id,
                        record.title,
                        m,
                        self.policy.time_window_hours
                    ),
                    None => log::info!(
                        "Skipping {} ({}): unknown posting age",
                        record.id,
                        record.title
                    ),
                }
                self.storage.save(record).await?;
            }
            Decision::Notify { novelty } => {
                stats.new_listings += 1;
                log::info!(
                    "Listing {} qualifies ({:?}): Rs {} at {}",
                    record.id,
                    novelty,
                    record.price,
                    record.address
                );

                match self.notifier.notify(record).await {
                    Ok(true) => {
                        stats.notifications_sent += 1;
                        log::info!("Notified via {}: {}", self.notifier.name(), record.title);
                    }
                    Ok(false) => {
                        stats.errors += 1;
                        log::error!("{} rejected notification for {}", self.notifier.name(), record.id);
                    }
                    Err(e) => {
                        stats.errors += 1;
                        log::error!("Notification for {} failed: {}", record.id, e);
                    }
                }

                self.storage.save(record).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::error::{AppError, ScrapeError};
    use crate::models::{Novelty, StoredListing, UnknownAgePolicy};
    use crate::storage::MemoryStorage;

    /// Memory store that counts calls.
    #[derive(Default)]
    struct RecordingStorage {
        inner: MemoryStorage,
        novelty_calls: AtomicUsize,
        saves: AtomicUsize,
        fail_saves: bool,
    }

    impl RecordingStorage {
        fn seeded(records: &[ListingRecord]) -> Self {
            Self {
                inner: MemoryStorage::seeded(records),
                ..Self::default()
            }
        }

        fn novelty_calls(&self) -> usize {
            self.novelty_calls.load(Ordering::SeqCst)
        }

        fn saves(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Storage for RecordingStorage {
        async fn is_initialized(&self) -> Result<bool> {
            self.inner.is_initialized().await
        }

        async fn set_initialized(&self) -> Result<()> {
            self.inner.set_initialized().await
        }

        async fn reset_initialized(&self) -> Result<()> {
            self.inner.reset_initialized().await
        }

        async fn novelty(&self, record: &ListingRecord) -> Result<Novelty> {
            self.novelty_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.novelty(record).await
        }

        async fn get(&self, id: &str) -> Result<Option<StoredListing>> {
            self.inner.get(id).await
        }

        async fn save(&self, record: &ListingRecord) -> Result<()> {
            if self.fail_saves {
                return Err(AppError::storage("disk full"));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save(record).await
        }

        async fn get_property_count(&self) -> Result<usize> {
            self.inner.get_property_count().await
        }

        async fn last_seen_at(&self) -> Result<Option<DateTime<Utc>>> {
            self.inner.last_seen_at().await
        }
    }

    #[derive(Clone, Copy)]
    enum Outcome {
        Delivered,
        Rejected,
        Broken,
    }

    struct RecordingSink {
        outcome: Outcome,
        sent: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn new(outcome: Outcome) -> Self {
            Self {
                outcome,
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn notify(&self, record: &ListingRecord) -> Result<bool> {
            self.sent.lock().unwrap().push(record.id.clone());
            match self.outcome {
                Outcome::Delivered => Ok(true),
                Outcome::Rejected => Ok(false),
                Outcome::Broken => Err(AppError::notify("recording", "connection reset")),
            }
        }

        async fn send_test_message(&self) -> Result<bool> {
            Ok(true)
        }
    }

    struct StaticSource {
        name: &'static str,
        result: std::result::Result<Vec<ListingRecord>, ScrapeError>,
    }

    #[async_trait]
    impl SourceAdapter for StaticSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn scrape(&self) -> std::result::Result<Vec<ListingRecord>, ScrapeError> {
            self.result.clone()
        }
    }

    fn source(listings: Vec<ListingRecord>) -> Box<dyn SourceAdapter> {
        Box::new(StaticSource {
            name: "static",
            result: Ok(listings),
        })
    }

    fn failing_source() -> Box<dyn SourceAdapter> {
        Box::new(StaticSource {
            name: "broken",
            result: Err(ScrapeError::network("https://example.com", "connection refused")),
        })
    }

    fn listing(id: &str, price: u32) -> ListingRecord {
        ListingRecord::new(id, format!("https://example.com/{id}"), format!("Flat {id}"), price)
    }

    fn aged(id: &str, price: u32, minutes: u32) -> ListingRecord {
        let mut record = listing(id, price);
        record.posted_minutes_ago = Some(minutes);
        record
    }

    fn policy() -> MonitorPolicy {
        MonitorPolicy {
            max_price: 10_000,
            time_window_hours: 24,
            unknown_age: UnknownAgePolicy::Notify,
        }
    }

    fn monitor(
        storage: RecordingStorage,
        outcome: Outcome,
    ) -> Monitor<RecordingStorage, RecordingSink> {
        Monitor::new(storage, RecordingSink::new(outcome), policy())
    }

    #[tokio::test]
    async fn test_baseline_records_without_notifying() {
        let m = monitor(RecordingStorage::default(), Outcome::Delivered);
        let sources = vec![source(vec![listing("a", 8000), listing("b", 15000)])];

        let stats = m.run_cycle(&sources).await.unwrap();

        assert!(stats.baseline);
        assert_eq!(stats.total_listings, 2);
        assert_eq!(stats.within_budget, 1);
        assert_eq!(stats.new_listings, 0);
        assert_eq!(stats.notifications_sent, 0);
        assert!(m.notifier().sent().is_empty());
        assert_eq!(m.storage().get_property_count().await.unwrap(), 2);
        assert!(m.storage().is_initialized().await.unwrap());
    }

    #[tokio::test]
    async fn test_baseline_rerun_does_not_duplicate() {
        let m = monitor(RecordingStorage::default(), Outcome::Delivered);
        let sources = vec![source(vec![listing("a", 8000), listing("b", 15000)])];

        m.run_cycle(&sources).await.unwrap();
        m.storage().reset_initialized().await.unwrap();
        let stats = m.run_cycle(&sources).await.unwrap();

        assert!(stats.baseline);
        assert_eq!(m.storage().get_property_count().await.unwrap(), 2);
        assert!(m.notifier().sent().is_empty());
    }

    #[tokio::test]
    async fn test_baseline_flips_even_with_failed_source() {
        let m = monitor(RecordingStorage::default(), Outcome::Delivered);
        let sources = vec![failing_source(), source(vec![listing("a", 8000)])];

        let stats = m.run_cycle(&sources).await.unwrap();

        assert_eq!(stats.errors, 1);
        assert!(m.storage().is_initialized().await.unwrap());

        // The next cycle is steady state.
        let stats = m.run_cycle(&sources).await.unwrap();
        assert!(!stats.baseline);
    }

    #[tokio::test]
    async fn test_price_drop_notifies_and_updates_store() {
        let m = monitor(
            RecordingStorage::seeded(&[listing("a", 8000)]),
            Outcome::Delivered,
        );

        let stats = m.run_cycle(&[source(vec![listing("a", 7000)])]).await.unwrap();

        assert!(!stats.baseline);
        assert_eq!(stats.new_listings, 1);
        assert_eq!(stats.notifications_sent, 1);
        assert_eq!(m.notifier().sent(), vec!["a"]);

        let stored = m.storage().get("a").await.unwrap().unwrap();
        assert_eq!(stored.record.price, 7000);
        assert_eq!(stored.last_price, Some(8000));
        assert!(stored.price_changed_at.is_some());
    }

    #[tokio::test]
    async fn test_over_budget_skips_store_and_sink() {
        let m = monitor(RecordingStorage::seeded(&[]), Outcome::Delivered);

        let stats = m.run_cycle(&[source(vec![aged("c", 20000, 5)])]).await.unwrap();

        assert_eq!(stats.within_budget, 0);
        assert_eq!(stats.new_listings, 0);
        assert_eq!(m.storage().novelty_calls(), 0);
        assert_eq!(m.storage().saves(), 0);
        assert!(m.notifier().sent().is_empty());
    }

    #[tokio::test]
    async fn test_over_budget_tracked_listing_is_refreshed_on_price_change() {
        let m = monitor(
            RecordingStorage::seeded(&[listing("a", 9000), listing("b", 12000)]),
            Outcome::Delivered,
        );

        let stats = m
            .run_cycle(&[source(vec![listing("a", 11000), listing("b", 12000)])])
            .await
            .unwrap();

        assert_eq!(stats.notifications_sent, 0);
        assert_eq!(m.storage().novelty_calls(), 0);
        assert_eq!(m.storage().saves(), 1);
        let stored = m.storage().get("a").await.unwrap().unwrap();
        assert_eq!(stored.record.price, 11000);
        assert_eq!(stored.last_price, Some(9000));
    }

    #[tokio::test]
    async fn test_unchanged_listing_is_not_rewritten() {
        let m = monitor(
            RecordingStorage::seeded(&[listing("a", 8000)]),
            Outcome::Delivered,
        );

        let stats = m.run_cycle(&[source(vec![listing("a", 8000)])]).await.unwrap();

        assert_eq!(stats.within_budget, 1);
        assert_eq!(stats.new_listings, 0);
        assert_eq!(m.storage().novelty_calls(), 1);
        assert_eq!(m.storage().saves(), 0);
    }

    #[tokio::test]
    async fn test_unknown_age_notifies_with_small_window() {
        let storage = RecordingStorage::seeded(&[]);
        let m = Monitor::new(
            storage,
            RecordingSink::new(Outcome::Delivered),
            MonitorPolicy {
                time_window_hours: 1,
                ..policy()
            },
        );

        let stats = m.run_cycle(&[source(vec![listing("n", 5000)])]).await.unwrap();

        assert_eq!(stats.notifications_sent, 1);
        assert_eq!(m.notifier().sent(), vec!["n"]);
    }

    #[tokio::test]
    async fn test_unknown_age_skip_policy() {
        let m = Monitor::new(
            RecordingStorage::seeded(&[]),
            RecordingSink::new(Outcome::Delivered),
            MonitorPolicy {
                unknown_age: UnknownAgePolicy::Skip,
                ..policy()
            },
        );

        let stats = m.run_cycle(&[source(vec![listing("n", 5000)])]).await.unwrap();

        assert_eq!(stats.new_listings, 0);
        assert!(m.notifier().sent().is_empty());
        assert_eq!(m.storage().saves(), 1);
    }

    #[tokio::test]
    async fn test_old_listing_is_saved_but_not_sent() {
        let m = monitor(RecordingStorage::seeded(&[]), Outcome::Delivered);

        let stats = m
            .run_cycle(&[source(vec![aged("old", 5000, 3 * 24 * 60)])])
            .await
            .unwrap();

        assert_eq!(stats.new_listings, 0);
        assert!(m.notifier().sent().is_empty());
        assert_eq!(m.storage().saves(), 1);

        // Once stored it is no longer novel.
        m.run_cycle(&[source(vec![aged("old", 5000, 3 * 24 * 60)])])
            .await
            .unwrap();
        assert_eq!(m.storage().saves(), 1);
    }

    #[tokio::test]
    async fn test_failed_notification_still_saves() {
        for outcome in [Outcome::Rejected, Outcome::Broken] {
            let m = monitor(RecordingStorage::seeded(&[]), outcome);
            let sources = vec![source(vec![aged("a", 5000, 10)])];

            let stats = m.run_cycle(&sources).await.unwrap();
            assert_eq!(stats.new_listings, 1);
            assert_eq!(stats.notifications_sent, 0);
            assert_eq!(stats.errors, 1);
            assert_eq!(m.storage().saves(), 1);

            // Not retried on the next cycle.
            let stats = m.run_cycle(&sources).await.unwrap();
            assert_eq!(stats.new_listings, 0);
            assert_eq!(m.notifier().sent(), vec!["a"]);
        }
    }

    #[tokio::test]
    async fn test_failing_source_is_isolated() {
        let m = monitor(RecordingStorage::seeded(&[]), Outcome::Delivered);
        let sources = vec![
            source(vec![listing("a", 5000), listing("b", 6000)]),
            failing_source(),
            source(vec![listing("c", 7000)]),
        ];

        let stats = m.run_cycle(&sources).await.unwrap();

        assert_eq!(stats.total_listings, 3);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.notifications_sent, 3);
        assert_eq!(m.notifier().sent(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_malformed_listing_is_counted_and_skipped() {
        let m = monitor(RecordingStorage::seeded(&[]), Outcome::Delivered);
        let mut relative = listing("r", 5000);
        relative.url = "/property/r".into();

        let stats = m
            .run_cycle(&[source(vec![listing("", 5000), relative, listing("ok", 5000)])])
            .await
            .unwrap();

        assert_eq!(stats.total_listings, 3);
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.notifications_sent, 1);
        assert_eq!(m.storage().get_property_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_aborts_cycle() {
        let storage = RecordingStorage {
            fail_saves: true,
            ..RecordingStorage::default()
        };
        let m = monitor(storage, Outcome::Delivered);

        let result = m.run_cycle(&[source(vec![listing("a", 5000)])]).await;

        assert!(matches!(result, Err(AppError::Storage(_))));
        assert!(!m.storage().is_initialized().await.unwrap());
    }

    #[tokio::test]
    async fn test_novelty_queried_once_per_candidate() {
        let m = monitor(
            RecordingStorage::seeded(&[listing("a", 8000)]),
            Outcome::Delivered,
        );

        m.run_cycle(&[source(vec![
            listing("a", 8000),
            aged("b", 9000, 5000),
            listing("c", 9500),
        ])])
        .await
        .unwrap();

        assert_eq!(m.storage().novelty_calls(), 3);
    }
}
