//! Crawler → queue → announcer handoff over a shared database file

use crate::common::{announcer, crawler, test_config, tiers, FakeCatalog, FakeChannel};
use catalog_herald::crawler::CycleOutcome;
use catalog_herald::delivery::DeliveryOutcome;
use catalog_herald::storage::{
    CycleRecord, CycleStatus, SeenOrigin, SqliteStorage, Storage, StorageError, StorageResult,
};
use catalog_herald::{FeedTarget, PendingItem, ScanState};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

#[tokio::test]
async fn test_new_entries_flow_from_listing_to_seen_set() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("herald.db"), tiers(&[(2, 0)]));
    let catalog = FakeCatalog::new(vec![vec!["105", "104", "103", "102", "101"]]);
    let channel = FakeChannel::new();

    let mut crawler = crawler(&config, &catalog);
    let (mut storage, verifier) = announcer(&config, &channel);
    storage.mark_seen("100", SeenOrigin::Imported).unwrap();
    storage.mark_seen("101", SeenOrigin::Imported).unwrap();

    let report = crawler.run_cycle().await.unwrap();
    assert_eq!(report.outcome, CycleOutcome::Published);
    assert_eq!(report.new_ids, vec!["102", "103", "104", "105"]);
    assert_eq!(report.scanned_pages, 1);

    let delivery = verifier.deliver_pending(&mut storage).await.unwrap();
    assert_eq!(delivery.committed(), 4);

    let posted: Vec<String> = channel
        .posts
        .lock()
        .unwrap()
        .iter()
        .map(|(id, _)| id.clone())
        .collect();
    assert_eq!(posted, vec!["102", "103", "104", "105"]);
    assert_eq!(storage.count_seen().unwrap(), 6);

    let next = crawler.run_cycle().await.unwrap();
    assert_eq!(next.outcome, CycleOutcome::NothingNew);
}

#[tokio::test]
async fn test_delivered_entry_is_never_enqueued_again() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("herald.db"), tiers(&[(2, 0)]));
    let catalog = FakeCatalog::new(vec![vec!["7"]]);
    let channel = FakeChannel::new();

    let mut crawler = crawler(&config, &catalog);
    let (mut storage, verifier) = announcer(&config, &channel);

    crawler.run_cycle().await.unwrap();
    verifier.deliver_pending(&mut storage).await.unwrap();

    catalog.publish("8");
    let report = crawler.run_cycle().await.unwrap();
    assert_eq!(report.new_ids, vec!["8"]);
    verifier.deliver_pending(&mut storage).await.unwrap();

    assert_eq!(channel.post_count("7"), 1);
    assert_eq!(channel.post_count("8"), 1);
    assert_eq!(storage.sorted_seen().unwrap(), vec!["7", "8"]);
}

#[tokio::test]
async fn test_unconfirmed_entry_is_rediscovered() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("herald.db"), tiers(&[(2, 0)]));
    let catalog = FakeCatalog::new(vec![vec!["31"]]);
    let channel = FakeChannel::new();
    channel.set_visible(false);

    let mut crawler = crawler(&config, &catalog);
    let (mut storage, verifier) = announcer(&config, &channel);

    crawler.run_cycle().await.unwrap();
    let delivery = verifier.deliver_pending(&mut storage).await.unwrap();
    assert_eq!(
        delivery.outcomes,
        vec![("31".to_string(), DeliveryOutcome::Unconfirmed)]
    );
    assert!(!storage.is_seen("31").unwrap());

    // The post did land; the next pass finds it before posting again
    channel.set_visible(true);
    let report = crawler.run_cycle().await.unwrap();
    assert_eq!(report.new_ids, vec!["31"]);

    let delivery = verifier.deliver_pending(&mut storage).await.unwrap();
    assert!(matches!(
        delivery.outcomes[0].1,
        DeliveryOutcome::AlreadyPresent(_)
    ));
    assert_eq!(channel.post_count("31"), 1);
    assert!(storage.is_seen("31").unwrap());
}

#[tokio::test]
async fn test_rejected_post_leaves_entry_for_next_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("herald.db"), tiers(&[(2, 0)]));
    let catalog = FakeCatalog::new(vec![vec!["50"]]);
    let channel = FakeChannel::new();
    *channel.reject_posts.lock().unwrap() = true;

    let mut crawler = crawler(&config, &catalog);
    let (mut storage, verifier) = announcer(&config, &channel);

    crawler.run_cycle().await.unwrap();
    let delivery = verifier.deliver_pending(&mut storage).await.unwrap();
    assert!(matches!(
        delivery.outcomes[0].1,
        DeliveryOutcome::PostFailed(_)
    ));

    *channel.reject_posts.lock().unwrap() = false;
    let report = crawler.run_cycle().await.unwrap();
    assert_eq!(report.outcome, CycleOutcome::Published);
    verifier.deliver_pending(&mut storage).await.unwrap();
    assert!(storage.is_seen("50").unwrap());
}

#[tokio::test]
async fn test_crawler_waits_for_undelivered_batch() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("herald.db"), tiers(&[(2, 0)]));
    let catalog = FakeCatalog::new(vec![vec!["2", "1"]]);
    let channel = FakeChannel::new();

    let mut crawler = crawler(&config, &catalog);
    let (mut storage, verifier) = announcer(&config, &channel);

    let first = crawler.run_cycle().await.unwrap();
    assert_eq!(first.enqueued, 2);

    catalog.publish("3");
    let busy = crawler.run_cycle().await.unwrap();
    assert_eq!(busy.outcome, CycleOutcome::QueueBusy);
    assert_eq!(
        crawler.storage().get_cycle(busy.cycle_id).unwrap().status,
        CycleStatus::Skipped
    );

    // The first batch is untouched by the skipped cycle
    assert_eq!(storage.pending_len().unwrap(), 2);
    let delivery = verifier.deliver_pending(&mut storage).await.unwrap();
    assert_eq!(delivery.committed(), 2);

    let resumed = crawler.run_cycle().await.unwrap();
    assert_eq!(resumed.new_ids, vec!["3"]);
}

#[tokio::test]
async fn test_deep_tier_stamps_every_shallower_tier() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(
        &dir.path().join("herald.db"),
        tiers(&[(2, 0), (12, 360), (25, 1440), (50, 2880)]),
    );
    let pages: Vec<Vec<&str>> = (0..60).map(|_| vec!["1"]).collect();
    let catalog = FakeCatalog::new(pages);
    let channel = FakeChannel::new();

    let mut crawler = crawler(&config, &catalog);
    let (mut storage, _) = announcer(&config, &channel);
    storage.mark_seen("1", SeenOrigin::Imported).unwrap();

    let report = crawler.run_cycle().await.unwrap();
    assert_eq!(report.tier_pages, 50);
    assert_eq!(report.scanned_pages, 50);

    let state = storage.load_scan_state().unwrap();
    let stamps: Vec<_> = [2, 12, 25, 50]
        .iter()
        .map(|&pages| state.last_covered(pages).unwrap())
        .collect();
    assert!(stamps.windows(2).all(|pair| pair[0] == pair[1]));

    let next = crawler.run_cycle().await.unwrap();
    assert_eq!(next.tier_pages, 2);
}

#[tokio::test]
async fn test_restricted_entries_go_to_restricted_feed() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("herald.db"), tiers(&[(2, 0)]));
    let catalog = FakeCatalog::new(vec![vec!["61", "60"]]);
    catalog.mark_restricted("61");
    let channel = FakeChannel::new();

    let mut crawler = crawler(&config, &catalog);
    let (mut storage, verifier) = announcer(&config, &channel);

    crawler.run_cycle().await.unwrap();
    verifier.deliver_pending(&mut storage).await.unwrap();

    let posts = channel.posts.lock().unwrap().clone();
    assert_eq!(
        posts,
        vec![
            ("60".to_string(), FeedTarget::Main),
            ("61".to_string(), FeedTarget::Restricted),
        ]
    );
}

/// Storage whose commit of one particular id fails, as on a full disk
struct FailingCommitStorage {
    inner: SqliteStorage,
    fail_on: String,
}

impl Storage for FailingCommitStorage {
    fn is_seen(&self, entry_id: &str) -> StorageResult<bool> {
        self.inner.is_seen(entry_id)
    }

    fn load_seen(&self) -> StorageResult<HashSet<String>> {
        self.inner.load_seen()
    }

    fn mark_seen(&mut self, entry_id: &str, origin: SeenOrigin) -> StorageResult<bool> {
        if entry_id == self.fail_on {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.mark_seen(entry_id, origin)
    }

    fn import_seen(&mut self, entry_ids: &[String]) -> StorageResult<usize> {
        self.inner.import_seen(entry_ids)
    }

    fn count_seen(&self) -> StorageResult<u64> {
        self.inner.count_seen()
    }

    fn sorted_seen(&self) -> StorageResult<Vec<String>> {
        self.inner.sorted_seen()
    }

    fn load_scan_state(&self) -> StorageResult<ScanState> {
        self.inner.load_scan_state()
    }

    fn save_scan_state(&mut self, state: &ScanState) -> StorageResult<()> {
        self.inner.save_scan_state(state)
    }

    fn pending_len(&self) -> StorageResult<usize> {
        self.inner.pending_len()
    }

    fn publish_pending(&mut self, items: &[PendingItem]) -> StorageResult<()> {
        self.inner.publish_pending(items)
    }

    fn drain_pending(&mut self) -> StorageResult<Vec<PendingItem>> {
        self.inner.drain_pending()
    }

    fn create_cycle(
        &mut self,
        config_hash: &str,
        tier_pages: u32,
        started_at: DateTime<Utc>,
    ) -> StorageResult<i64> {
        self.inner.create_cycle(config_hash, tier_pages, started_at)
    }

    fn finish_cycle(
        &mut self,
        cycle_id: i64,
        status: CycleStatus,
        scanned_pages: u32,
        new_entries: u32,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        self.inner
            .finish_cycle(cycle_id, status, scanned_pages, new_entries, error_message)
    }

    fn get_cycle(&self, cycle_id: i64) -> StorageResult<CycleRecord> {
        self.inner.get_cycle(cycle_id)
    }

    fn recent_cycles(&self, limit: usize) -> StorageResult<Vec<CycleRecord>> {
        self.inner.recent_cycles(limit)
    }
}

#[tokio::test]
async fn test_each_confirmation_is_committed_before_the_next_post() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("herald.db"), tiers(&[(2, 0)]));
    let catalog = FakeCatalog::new(vec![vec!["2", "1"]]);
    let channel = FakeChannel::new();

    let mut crawler = crawler(&config, &catalog);
    let (storage, verifier) = announcer(&config, &channel);
    let mut storage = FailingCommitStorage {
        inner: storage,
        fail_on: "2".to_string(),
    };

    let report = crawler.run_cycle().await.unwrap();
    assert_eq!(report.new_ids, vec!["1", "2"]);

    let err = verifier.deliver_pending(&mut storage).await.unwrap_err();
    assert!(err.is_fatal());

    // "1" survives the failure on "2"
    assert!(storage.is_seen("1").unwrap());
    assert!(!storage.is_seen("2").unwrap());

    let next = crawler.run_cycle().await.unwrap();
    assert_eq!(next.new_ids, vec!["2"]);
}
