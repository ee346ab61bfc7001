//! Crawler coordinator - crawl cycle orchestration
//!
//! One cycle:
//! 1. Skips early while the previous batch is undelivered
//! 2. Picks a tier and records the cycle
//! 3. Scans listing pages for ids missing from the seen set
//! 4. Fetches details of the new entries
//! 5. Publishes them as one batch and advances the scan state

use crate::config::Config;
use crate::crawler::detector::{Detection, Detector};
use crate::crawler::scheduler::{Scheduler, Tier};
use crate::crawler::source::{CatalogSource, HtmlCatalog};
use crate::delivery::PendingQueue;
use crate::state::PendingItem;
use crate::storage::{CycleStatus, SqliteStorage, Storage};
use crate::{ConfigError, HeraldError, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// New entries were handed off
    Published,

    /// The scan found nothing new
    NothingNew,

    /// The previous batch was still pending
    QueueBusy,
}

/// Summary of one crawl cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: i64,
    pub tier_pages: u32,
    pub outcome: CycleOutcome,
    pub scanned_pages: u32,
    pub final_depth: u32,

    /// New ids found by the scan, oldest first
    pub new_ids: Vec<String>,

    /// Entries handed off to the announcer
    pub enqueued: usize,

    /// New ids whose detail page could not be fetched
    pub skipped_entries: Vec<String>,
}

impl CycleReport {
    fn skipped(cycle_id: i64, tier_pages: u32) -> Self {
        Self {
            cycle_id,
            tier_pages,
            outcome: CycleOutcome::QueueBusy,
            scanned_pages: 0,
            final_depth: tier_pages,
            new_ids: Vec::new(),
            enqueued: 0,
            skipped_entries: Vec::new(),
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator<C: CatalogSource, S: Storage = SqliteStorage> {
    config: Config,
    config_hash: String,
    storage: S,
    source: C,
    scheduler: Scheduler,
    detector: Detector,
}

impl Coordinator<HtmlCatalog> {
    /// Creates a coordinator reading the live catalog over HTTP
    pub fn from_config(config: Config, config_hash: String) -> Result<Self> {
        let storage = SqliteStorage::new(Path::new(&config.storage.database_path))?;
        let source = HtmlCatalog::from_config(&config)?;
        Ok(Self::new(config, config_hash, storage, source))
    }
}

impl<C: CatalogSource, S: Storage> Coordinator<C, S> {
    pub fn new(config: Config, config_hash: String, storage: S, source: C) -> Self {
        let scheduler = Scheduler::new(config.tiers.clone());
        let detector = Detector::new(config.extension, config.crawler.max_pages);

        Self {
            config,
            config_hash,
            storage,
            source,
            scheduler,
            detector,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Runs one crawl cycle
    ///
    /// A listing-page failure or a suspicious batch fails the cycle without
    /// touching the seen set or the scan state.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.run_cycle_with_depth(None).await
    }

    /// Runs one crawl cycle, scanning `pages` pages instead of the
    /// scheduled tier when given
    ///
    /// A manual depth still stamps every tier it covers. It must lie in
    /// `1..=max-pages`.
    pub async fn run_cycle_with_depth(&mut self, pages: Option<u32>) -> Result<CycleReport> {
        let started_at = Utc::now();
        let tier = match pages {
            Some(pages) => self.manual_tier(pages)?,
            None => {
                let scan_state = self.storage.load_scan_state()?;
                self.scheduler.select(&scan_state, started_at)
            }
        };
        let cycle_id = self
            .storage
            .create_cycle(&self.config_hash, tier.pages, started_at)?;

        let span = tracing::info_span!("cycle", id = cycle_id, tier = tier.pages);
        self.execute_cycle(cycle_id, tier, started_at)
            .instrument(span)
            .await
    }

    fn manual_tier(&self, pages: u32) -> Result<Tier> {
        let max_pages = self.config.crawler.max_pages;
        if pages == 0 || pages > max_pages {
            return Err(ConfigError::Validation(format!(
                "manual scan depth must be between 1 and max-pages ({}), got {}",
                max_pages, pages
            ))
            .into());
        }
        tracing::info!("Manual scan of {} pages requested", pages);
        Ok(Tier {
            pages,
            interval: chrono::Duration::zero(),
        })
    }

    async fn execute_cycle(
        &mut self,
        cycle_id: i64,
        tier: Tier,
        started_at: DateTime<Utc>,
    ) -> Result<CycleReport> {
        let pending = self.storage.pending_len()?;
        if pending > 0 {
            tracing::info!(
                "Previous batch of {} entries not yet delivered, skipping cycle",
                pending
            );
            self.storage
                .finish_cycle(cycle_id, CycleStatus::Skipped, 0, 0, None)?;
            return Ok(CycleReport::skipped(cycle_id, tier.pages));
        }

        tracing::info!("Scanning {} listing pages", tier.pages);

        match self.scan_and_publish(tier.pages).await {
            Ok((detection, enqueued, skipped_entries)) => {
                let outcome = if enqueued > 0 {
                    CycleOutcome::Published
                } else {
                    CycleOutcome::NothingNew
                };

                let mut scan_state = self.storage.load_scan_state()?;
                let stamped =
                    self.scheduler
                        .record_coverage(&mut scan_state, detection.coverage(), started_at);
                self.storage.save_scan_state(&scan_state)?;
                tracing::debug!("Stamped tiers {:?}", stamped);

                self.storage.finish_cycle(
                    cycle_id,
                    CycleStatus::Completed,
                    detection.pages_scanned,
                    enqueued as u32,
                    None,
                )?;

                tracing::info!(
                    "Cycle complete: {} pages scanned, {} new, {} enqueued",
                    detection.pages_scanned,
                    detection.new_ids.len(),
                    enqueued
                );

                Ok(CycleReport {
                    cycle_id,
                    tier_pages: tier.pages,
                    outcome,
                    scanned_pages: detection.pages_scanned,
                    final_depth: detection.final_depth,
                    new_ids: detection.new_ids,
                    enqueued,
                    skipped_entries,
                })
            }
            Err(HeraldError::QueueBusy { pending }) => {
                tracing::info!(
                    "Announcer has not drained {} entries, batch dropped for this cycle",
                    pending
                );
                self.storage
                    .finish_cycle(cycle_id, CycleStatus::Skipped, 0, 0, None)?;
                Ok(CycleReport::skipped(cycle_id, tier.pages))
            }
            Err(e) => {
                tracing::error!("Cycle failed: {}", e);
                let message = e.to_string();
                self.storage.finish_cycle(
                    cycle_id,
                    CycleStatus::Failed,
                    0,
                    0,
                    Some(&message),
                )?;
                Err(e)
            }
        }
    }

    /// Scans, fetches details and publishes the batch
    ///
    /// Returns the detection, the number of entries enqueued and the ids
    /// skipped because their details could not be fetched.
    async fn scan_and_publish(&mut self, depth: u32) -> Result<(Detection, usize, Vec<String>)> {
        let seen = self.storage.load_seen()?;
        let detection = self.detector.detect(&self.source, &seen, depth).await?;

        let limit = self.config.crawler.max_new_per_cycle;
        if detection.new_ids.len() > limit {
            return Err(HeraldError::SuspiciousBatch {
                count: detection.new_ids.len(),
                limit,
            });
        }

        let mut items = Vec::with_capacity(detection.new_ids.len());
        let mut skipped = Vec::new();

        for id in &detection.new_ids {
            match self.source.fetch_entry_detail(id).await {
                Ok(entry) => {
                    tracing::debug!("Fetched entry {}: {}", id, entry.title);
                    items.push(PendingItem::new(entry));
                }
                Err(e) => {
                    tracing::warn!("Skipping entry {}: {}", id, e);
                    skipped.push(id.clone());
                }
            }
        }

        PendingQueue::new(&mut self.storage).publish(&items)?;

        Ok((detection, items.len(), skipped))
    }

    /// Runs cycles until `shutdown` is cancelled, sleeping `cycle-interval`
    /// in between
    ///
    /// A running cycle is always finished; cancellation is honored right
    /// after it and during the sleep. Failed cycles are logged and retried
    /// next time; fatal errors stop the loop.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        let cycle_interval = Duration::from_secs(self.config.crawler.cycle_interval);

        tracing::info!(
            "Crawler started, one cycle every {}s",
            self.config.crawler.cycle_interval
        );

        loop {
            match self.run_cycle().await {
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    tracing::error!("Crawler stopping: {}", e);
                    return Err(e);
                }
                Err(_) => {}
            }

            if shutdown.is_cancelled() {
                break;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(cycle_interval) => {}
            }
        }

        tracing::info!("Interrupted, crawler shutting down");
        Ok(())
    }
}
