//! Handoff queue between crawler and announcer
//!
//! A single-slot queue over the shared storage: the crawler publishes at
//! most one batch, the announcer drains it whole.

use crate::state::PendingItem;
use crate::storage::{Storage, StorageError};
use crate::{HeraldError, Result};

/// Producer/consumer view of the pending batch
pub struct PendingQueue<'a, S: Storage + ?Sized> {
    storage: &'a mut S,
}

impl<'a, S: Storage + ?Sized> PendingQueue<'a, S> {
    pub fn new(storage: &'a mut S) -> Self {
        Self { storage }
    }

    /// Number of entries still waiting for delivery
    pub fn len(&self) -> Result<usize> {
        Ok(self.storage.pending_len()?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Publishes a batch atomically
    ///
    /// An empty batch is a no-op. Fails with `HeraldError::QueueBusy` while
    /// the previous batch is undrained, leaving it untouched.
    pub fn publish(&mut self, items: &[PendingItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        match self.storage.publish_pending(items) {
            Ok(()) => {
                tracing::debug!("Published {} entries to the handoff queue", items.len());
                Ok(())
            }
            Err(StorageError::QueueBusy { pending }) => Err(HeraldError::QueueBusy { pending }),
            Err(e) => Err(e.into()),
        }
    }

    /// Takes the whole pending batch, in publish order
    pub fn drain(&mut self) -> Result<Vec<PendingItem>> {
        Ok(self.storage.drain_pending()?)
    }
}
