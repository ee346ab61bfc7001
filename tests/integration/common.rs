use async_trait::async_trait;
use catalog_herald::config::{
    CatalogConfig, ChannelConfig, Config, CrawlerConfig, DeliveryConfig, ExtensionConfig,
    StorageConfig, TierConfig, UserAgentConfig,
};
use catalog_herald::crawler::{CatalogSource, Coordinator};
use catalog_herald::delivery::{
    ChannelError, ChannelResult, DeliveryChannel, Receipt, Verifier, VerifierSettings,
};
use catalog_herald::storage::SqliteStorage;
use catalog_herald::{CatalogEntry, FeedTarget, FetchError, FetchResult};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Catalog held in memory: listing pages newest first, past the end is NotFound
///
/// Clones share the same pages, so a test can publish entries while a
/// coordinator owns another handle.
#[derive(Clone, Default)]
pub struct FakeCatalog {
    pages: Arc<Mutex<Vec<Vec<String>>>>,
    restricted: Arc<Mutex<HashSet<String>>>,
}

impl FakeCatalog {
    pub fn new(pages: Vec<Vec<&str>>) -> Self {
        let pages = pages
            .into_iter()
            .map(|page| page.into_iter().map(String::from).collect())
            .collect();
        Self {
            pages: Arc::new(Mutex::new(pages)),
            restricted: Arc::default(),
        }
    }

    /// Publishes a new entry at the top of the first page
    pub fn publish(&self, id: &str) {
        let mut pages = self.pages.lock().unwrap();
        if pages.is_empty() {
            pages.push(Vec::new());
        }
        pages[0].insert(0, id.to_string());
    }

    pub fn mark_restricted(&self, id: &str) {
        self.restricted.lock().unwrap().insert(id.to_string());
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn fetch_listing_page(&self, page: u32) -> FetchResult<Vec<String>> {
        let pages = self.pages.lock().unwrap();
        pages
            .get(page as usize)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                url: format!("fake://listing/{}", page),
            })
    }

    async fn fetch_entry_detail(&self, id: &str) -> FetchResult<CatalogEntry> {
        let is_restricted = self.restricted.lock().unwrap().contains(id);
        Ok(CatalogEntry {
            id: id.to_string(),
            title: format!("Entry {}", id),
            status: "Not yet aired".to_string(),
            air_date: None,
            synopsis: Some(format!("Synopsis of {}", id)),
            image_url: None,
            is_restricted,
        })
    }
}

/// Channel recording every post; `visible` decides whether posts show up
pub struct FakeChannel {
    pub posts: Mutex<Vec<(String, FeedTarget)>>,
    pub visible: Mutex<bool>,
    pub reject_posts: Mutex<bool>,
}

impl FakeChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            posts: Mutex::new(Vec::new()),
            visible: Mutex::new(true),
            reject_posts: Mutex::new(false),
        })
    }

    pub fn post_count(&self, id: &str) -> usize {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|(posted, _)| posted == id)
            .count()
    }

    pub fn set_visible(&self, visible: bool) {
        *self.visible.lock().unwrap() = visible;
    }
}

#[async_trait]
impl DeliveryChannel for FakeChannel {
    async fn post(&self, entry: &CatalogEntry, target: FeedTarget) -> ChannelResult<()> {
        if *self.reject_posts.lock().unwrap() {
            return Err(ChannelError::Rejected { status: 503 });
        }
        self.posts
            .lock()
            .unwrap()
            .push((entry.id.clone(), target));
        Ok(())
    }

    async fn find(&self, entry_id: &str, target: FeedTarget) -> ChannelResult<Option<Receipt>> {
        if !*self.visible.lock().unwrap() {
            return Ok(None);
        }
        let posts = self.posts.lock().unwrap();
        Ok(posts
            .iter()
            .rposition(|(id, t)| id == entry_id && *t == target)
            .map(|index| Receipt {
                entry_id: entry_id.to_string(),
                reference: format!("fake://{}/{}", target, index),
            }))
    }
}

pub fn tiers(layout: &[(u32, u64)]) -> Vec<TierConfig> {
    layout.iter()
        .map(|&(pages, interval_minutes)| TierConfig {
            pages,
            interval_minutes,
        })
        .collect()
}

/// Configuration with fast delivery settings and the given tiers
pub fn test_config(database_path: &Path, tiers: Vec<TierConfig>) -> Config {
    Config {
        crawler: CrawlerConfig {
            fetch_interval: 10,
            max_retries: 1,
            max_pages: 100,
            cycle_interval: 600,
            max_new_per_cycle: 1000,
            respect_robots_txt: false,
        },
        user_agent: UserAgentConfig {
            crawler_name: "HeraldTest".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
        },
        catalog: CatalogConfig {
            listing_url: "http://catalog.invalid/list?show={offset}".to_string(),
            page_size: 50,
            detail_url: "http://catalog.invalid/anime/{id}".to_string(),
            entry_path_prefix: "/anime/".to_string(),
            title_selector: None,
            image_selector: "td.borderClass img".to_string(),
            synopsis_selector: "[itemprop=\"description\"]".to_string(),
            info_label_selector: "span.dark_text".to_string(),
            restricted_genres: vec!["Hentai".to_string()],
            placeholder_image_prefix: None,
        },
        extension: ExtensionConfig::default(),
        tiers,
        delivery: DeliveryConfig {
            confirm_attempts: 2,
            confirm_delay: 1,
            poll_interval: 1,
            min_seen_entries: 0,
        },
        channel: ChannelConfig::File {
            directory: "./outbox".to_string(),
            search_window: 100,
        },
        storage: StorageConfig {
            database_path: database_path.display().to_string(),
        },
    }
}

/// Crawler with its own connection to the shared database
pub fn crawler(config: &Config, catalog: &FakeCatalog) -> Coordinator<FakeCatalog> {
    let storage = SqliteStorage::new(Path::new(&config.storage.database_path)).unwrap();
    Coordinator::new(
        config.clone(),
        "integration".to_string(),
        storage,
        catalog.clone(),
    )
}

/// Announcer connection and verifier over the fake channel
pub fn announcer(
    config: &Config,
    channel: &Arc<FakeChannel>,
) -> (SqliteStorage, Verifier<Arc<FakeChannel>>) {
    let storage = SqliteStorage::new(Path::new(&config.storage.database_path)).unwrap();
    let verifier = Verifier::new(
        Arc::clone(channel),
        VerifierSettings::from(&config.delivery),
    );
    (storage, verifier)
}
