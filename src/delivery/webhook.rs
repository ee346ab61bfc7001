//! HTTP webhook channel
//!
//! Announcements are POSTed as JSON to the feed's URL. Confirmation issues
//! `GET <url>?entry_id=<id>&limit=<window>`, which must answer with a JSON
//! array of the matching recent posts.

use crate::delivery::channel::{ChannelError, ChannelResult, DeliveryChannel, PostedRecord, Receipt};
use crate::state::{CatalogEntry, FeedTarget};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};

/// Delivery channel backed by two webhook endpoints
pub struct WebhookChannel {
    client: Client,
    main_url: String,
    restricted_url: String,
    search_window: usize,
}

impl WebhookChannel {
    pub fn new(
        client: Client,
        main_url: String,
        restricted_url: String,
        search_window: usize,
    ) -> Self {
        Self {
            client,
            main_url,
            restricted_url,
            search_window,
        }
    }

    fn url_for(&self, target: FeedTarget) -> &str {
        match target {
            FeedTarget::Main => &self.main_url,
            FeedTarget::Restricted => &self.restricted_url,
        }
    }
}

#[async_trait]
impl DeliveryChannel for WebhookChannel {
    async fn post(&self, entry: &CatalogEntry, target: FeedTarget) -> ChannelResult<()> {
        let response = self
            .client
            .post(self.url_for(target))
            .json(&PostedRecord::new(entry))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
            });
        }

        tracing::debug!("Posted entry {} to the {} webhook", entry.id, target);
        Ok(())
    }

    async fn find(&self, entry_id: &str, target: FeedTarget) -> ChannelResult<Option<Receipt>> {
        let url = self.url_for(target);
        let limit = self.search_window.to_string();
        let response = self
            .client
            .get(url)
            .query(&[("entry_id", entry_id), ("limit", limit.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let records: Vec<PostedRecord> = serde_json::from_str(&body)?;

        Ok(records
            .into_iter()
            .find(|record| record.entry_id == entry_id)
            .map(|record| Receipt {
                reference: format!("{}?entry_id={}", url, record.entry_id),
                entry_id: record.entry_id,
            }))
    }
}
