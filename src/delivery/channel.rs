//! Delivery channel interface
//!
//! A channel can post an announcement and later be asked whether an
//! announcement for a given id is observably present.

use crate::state::{CatalogEntry, FeedTarget};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by delivery channels
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Channel HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Channel rejected the request with HTTP {status}")]
    Rejected { status: u16 },

    #[error("Channel payload error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Proof that an announcement is observably present in a feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub entry_id: String,

    /// Channel-specific locator of the announcement
    pub reference: String,
}

/// One announcement as recorded by a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedRecord {
    pub entry_id: String,
    pub title: String,
    pub posted_at: DateTime<Utc>,

    /// The announced entry, absent in records written by other tools
    #[serde(default)]
    pub entry: Option<CatalogEntry>,
}

impl PostedRecord {
    pub fn new(entry: &CatalogEntry) -> Self {
        Self {
            entry_id: entry.id.clone(),
            title: entry.title.clone(),
            posted_at: Utc::now(),
            entry: Some(entry.clone()),
        }
    }
}

/// Downstream sink for announcements
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Posts an announcement for `entry` to the `target` feed
    async fn post(&self, entry: &CatalogEntry, target: FeedTarget) -> ChannelResult<()>;

    /// Looks for an announcement of `entry_id` among the feed's recent posts
    async fn find(&self, entry_id: &str, target: FeedTarget) -> ChannelResult<Option<Receipt>>;
}

#[async_trait]
impl<C: DeliveryChannel + ?Sized> DeliveryChannel for Arc<C> {
    async fn post(&self, entry: &CatalogEntry, target: FeedTarget) -> ChannelResult<()> {
        (**self).post(entry, target).await
    }

    async fn find(&self, entry_id: &str, target: FeedTarget) -> ChannelResult<Option<Receipt>> {
        (**self).find(entry_id, target).await
    }
}
