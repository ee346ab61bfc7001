//! Catalog access seam
//!
//! The detector and coordinator only talk to a [`CatalogSource`];
//! [`HtmlCatalog`] is the production implementation over the rate-limited
//! fetcher.

use crate::config::{CatalogConfig, Config};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::{extract_entry_ids, parse_entry_detail};
use crate::state::CatalogEntry;
use crate::{FetchError, FetchResult};
use async_trait::async_trait;
use url::Url;

/// Read access to the catalog
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Ids listed on a zero-based listing page, newest first
    ///
    /// A page past the end of the catalog fails with `FetchError::NotFound`.
    async fn fetch_listing_page(&self, page: u32) -> FetchResult<Vec<String>>;

    /// Full metadata of one entry
    async fn fetch_entry_detail(&self, id: &str) -> FetchResult<CatalogEntry>;
}

/// Catalog read over HTTP and parsed with CSS selectors
pub struct HtmlCatalog {
    fetcher: Fetcher,
    catalog: CatalogConfig,
}

impl HtmlCatalog {
    pub fn new(fetcher: Fetcher, catalog: CatalogConfig) -> Self {
        Self { fetcher, catalog }
    }

    /// Builds the fetcher and catalog settings from the full configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let fetcher = Fetcher::new(&config.crawler, &config.user_agent)?;
        Ok(Self::new(fetcher, config.catalog.clone()))
    }
}

#[async_trait]
impl CatalogSource for HtmlCatalog {
    async fn fetch_listing_page(&self, page: u32) -> FetchResult<Vec<String>> {
        let url = self.catalog.listing_page_url(page);
        let fetched = self.fetcher.get(&url).await?;

        let base = Url::parse(&fetched.url).map_err(|e| FetchError::Body {
            url: fetched.url.clone(),
            message: e.to_string(),
        })?;

        let ids = extract_entry_ids(&fetched.body, &base, &self.catalog.entry_path_prefix);
        tracing::debug!("Listing page {} lists {} entries", page, ids.len());
        Ok(ids)
    }

    async fn fetch_entry_detail(&self, id: &str) -> FetchResult<CatalogEntry> {
        let url = self.catalog.detail_page_url(id);
        let fetched = self.fetcher.get(&url).await?;

        parse_entry_detail(id, &fetched.body, &self.catalog)
            .map_err(|message| FetchError::Body { url, message })
    }
}
