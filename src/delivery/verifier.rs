//! Delivery verifier
//!
//! Drains the handoff queue and announces each entry, committing an id to
//! the seen set only once the channel shows the announcement.

use crate::config::DeliveryConfig;
use crate::delivery::channel::{DeliveryChannel, Receipt};
use crate::delivery::queue::PendingQueue;
use crate::state::PendingItem;
use crate::storage::{SeenOrigin, Storage};
use crate::{HeraldError, Result};
use std::time::Duration;
use tokio::time::sleep;

/// Confirmation and guard settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifierSettings {
    /// Lookups after posting before giving up
    pub confirm_attempts: u32,

    /// Wait before each lookup
    pub confirm_delay: Duration,

    /// Refuse to drain while the seen set is smaller than this
    pub min_seen_entries: u64,
}

impl From<&DeliveryConfig> for VerifierSettings {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            confirm_attempts: config.confirm_attempts,
            confirm_delay: Duration::from_millis(config.confirm_delay),
            min_seen_entries: config.min_seen_entries,
        }
    }
}

/// What happened to one drained entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Posted and confirmed; committed to the seen set
    Delivered(Receipt),

    /// Found in the channel before posting; committed without re-posting
    AlreadyPresent(Receipt),

    /// The id was already in the seen set
    AlreadySeen,

    /// Posted but never observed; left for rediscovery
    Unconfirmed,

    /// The post itself failed; left for rediscovery
    PostFailed(String),
}

impl DeliveryOutcome {
    /// Returns true if the id is in the seen set afterwards
    pub fn is_committed(&self) -> bool {
        !matches!(self, Self::Unconfirmed | Self::PostFailed(_))
    }
}

/// Per-batch delivery summary
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    /// `(entry id, outcome)` in queue order
    pub outcomes: Vec<(String, DeliveryOutcome)>,
}

impl DeliveryReport {
    pub fn drained(&self) -> usize {
        self.outcomes.len()
    }

    /// Entries newly committed to the seen set
    pub fn committed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, DeliveryOutcome::Delivered(_) | DeliveryOutcome::AlreadyPresent(_)))
            .count()
    }

    /// Entries left for rediscovery
    pub fn unresolved(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| !o.is_committed()).count()
    }
}

/// Announces queued entries through a channel
pub struct Verifier<C: DeliveryChannel> {
    channel: C,
    settings: VerifierSettings,
}

impl<C: DeliveryChannel> Verifier<C> {
    pub fn new(channel: C, settings: VerifierSettings) -> Self {
        Self { channel, settings }
    }

    /// Drains the pending batch and delivers every entry
    ///
    /// Each confirmed id is committed immediately. A storage failure aborts
    /// the batch; entries not yet handled stay out of the seen set and are
    /// rediscovered by the crawler.
    pub async fn deliver_pending<S: Storage + ?Sized>(
        &self,
        storage: &mut S,
    ) -> Result<DeliveryReport> {
        if self.settings.min_seen_entries > 0 {
            let count = storage.count_seen()?;
            if count < self.settings.min_seen_entries {
                return Err(HeraldError::SeenSetTooSmall {
                    count,
                    minimum: self.settings.min_seen_entries,
                });
            }
        }

        let items = PendingQueue::new(&mut *storage).drain()?;
        let mut report = DeliveryReport::default();
        if items.is_empty() {
            return Ok(report);
        }

        tracing::info!("Delivering {} pending entries", items.len());

        for item in &items {
            let outcome = self.deliver(storage, item).await?;
            match &outcome {
                DeliveryOutcome::Delivered(receipt) => {
                    tracing::info!("Delivered {} ({})", item.id(), receipt.reference)
                }
                DeliveryOutcome::AlreadyPresent(_) => {
                    tracing::info!("Entry {} was already announced, committed", item.id())
                }
                DeliveryOutcome::AlreadySeen => {
                    tracing::debug!("Entry {} already delivered, skipping", item.id())
                }
                DeliveryOutcome::Unconfirmed => tracing::warn!(
                    "DeliveryUnconfirmed: entry {} not visible in the {} feed, leaving it for rediscovery",
                    item.id(),
                    item.target
                ),
                DeliveryOutcome::PostFailed(e) => {
                    tracing::warn!("Posting entry {} failed: {}", item.id(), e)
                }
            }
            report.outcomes.push((item.id().to_string(), outcome));
        }

        tracing::info!(
            "Delivery finished: {} committed, {} left for rediscovery",
            report.committed(),
            report.unresolved()
        );

        Ok(report)
    }

    /// Delivers one entry
    async fn deliver<S: Storage + ?Sized>(
        &self,
        storage: &mut S,
        item: &PendingItem,
    ) -> Result<DeliveryOutcome> {
        let id = item.id();

        if storage.is_seen(id)? {
            return Ok(DeliveryOutcome::AlreadySeen);
        }

        // A crash between post and commit leaves the announcement in place
        match self.channel.find(id, item.target).await {
            Ok(Some(receipt)) => {
                storage.mark_seen(id, SeenOrigin::Delivered)?;
                return Ok(DeliveryOutcome::AlreadyPresent(receipt));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Pre-post lookup for {} failed: {}", id, e),
        }

        if let Err(e) = self.channel.post(&item.entry, item.target).await {
            return Ok(DeliveryOutcome::PostFailed(e.to_string()));
        }

        for attempt in 1..=self.settings.confirm_attempts {
            sleep(self.settings.confirm_delay).await;
            match self.channel.find(id, item.target).await {
                Ok(Some(receipt)) => {
                    storage.mark_seen(id, SeenOrigin::Delivered)?;
                    return Ok(DeliveryOutcome::Delivered(receipt));
                }
                Ok(None) => tracing::debug!(
                    "Entry {} not visible yet (lookup {}/{})",
                    id,
                    attempt,
                    self.settings.confirm_attempts
                ),
                Err(e) => tracing::warn!("Confirmation lookup for {} failed: {}", id, e),
            }
        }

        Ok(DeliveryOutcome::Unconfirmed)
    }
}
