use serde::Deserialize;

/// Main configuration structure for Catalog-Herald
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub extension: ExtensionConfig,
    #[serde(rename = "tier", default = "default_tiers")]
    pub tiers: Vec<TierConfig>,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    pub channel: ChannelConfig,
    pub storage: StorageConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Minimum time between two requests to the catalog (milliseconds)
    #[serde(rename = "fetch-interval")]
    pub fetch_interval: u64,

    /// Number of retries after the first failed attempt
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Hard cap on listing pages scanned in one cycle, extensions included
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Sleep between two crawl cycles (seconds)
    #[serde(rename = "cycle-interval", default = "default_cycle_interval")]
    pub cycle_interval: u64,

    /// More new ids than this in one cycle aborts the cycle
    #[serde(rename = "max-new-per-cycle", default = "default_max_new_per_cycle")]
    pub max_new_per_cycle: usize,

    /// Honor robots.txt rules and crawl delay of the catalog host
    #[serde(rename = "respect-robots-txt", default)]
    pub respect_robots_txt: bool,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

/// Where and how to read the catalog
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Listing URL template; `{offset}` and `{page}` are substituted
    #[serde(rename = "listing-url")]
    pub listing_url: String,

    /// Number of entries per listing page (used to compute `{offset}`)
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Detail URL template; `{id}` is substituted
    #[serde(rename = "detail-url")]
    pub detail_url: String,

    /// Path prefix of entry links, followed by the numeric id
    #[serde(rename = "entry-path-prefix")]
    pub entry_path_prefix: String,

    #[serde(rename = "title-selector", default)]
    pub title_selector: Option<String>,

    #[serde(rename = "image-selector", default = "default_image_selector")]
    pub image_selector: String,

    #[serde(rename = "synopsis-selector", default = "default_synopsis_selector")]
    pub synopsis_selector: String,

    /// Selector for sidebar labels such as `Status:` or `Aired:`
    #[serde(rename = "info-label-selector", default = "default_info_label_selector")]
    pub info_label_selector: String,

    /// Genres that route an entry to the restricted feed
    #[serde(rename = "restricted-genres", default)]
    pub restricted_genres: Vec<String>,

    /// Image URLs starting with this prefix are site placeholders
    #[serde(rename = "placeholder-image-prefix", default)]
    pub placeholder_image_prefix: Option<String>,
}

impl CatalogConfig {
    /// Builds the listing URL for a zero-based page number
    pub fn listing_page_url(&self, page: u32) -> String {
        let offset = u64::from(page) * u64::from(self.page_size);
        self.listing_url
            .replace("{offset}", &offset.to_string())
            .replace("{page}", &page.to_string())
    }

    /// Builds the detail URL for an entry id
    pub fn detail_page_url(&self, id: &str) -> String {
        self.detail_url.replace("{id}", id)
    }
}

/// Adaptive extension policy
///
/// Finding a new id on page `p` extends the scan to at least
/// `p + 1 + extension(p)` pages, where `extension(p)` grows with the page
/// number and never exceeds `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ExtensionConfig {
    /// Extra pages scanned past a hit on page 0
    #[serde(default = "default_extension_base")]
    pub base: u32,

    /// One more extra page for every `growth-every` pages of depth
    #[serde(rename = "growth-every", default = "default_extension_growth")]
    pub growth_every: u32,

    /// Upper bound on the extra pages
    #[serde(default = "default_extension_max")]
    pub max: u32,
}

impl ExtensionConfig {
    /// Number of extra pages to scan after a new id on `page`
    pub fn extension(&self, page: u32) -> u32 {
        let growth = page.checked_div(self.growth_every).unwrap_or(0);
        self.base.saturating_add(growth).min(self.max)
    }
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            base: default_extension_base(),
            growth_every: default_extension_growth(),
            max: default_extension_max(),
        }
    }
}

/// One scan tier: a depth in pages and the cadence at which it must be covered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TierConfig {
    pub pages: u32,

    /// Minutes between two full coverages of this tier
    #[serde(rename = "interval-minutes")]
    pub interval_minutes: u64,
}

/// Delivery verification settings
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// How many times to look for a posted entry before giving up
    #[serde(rename = "confirm-attempts", default = "default_confirm_attempts")]
    pub confirm_attempts: u32,

    /// Delay before each confirmation lookup (milliseconds)
    #[serde(rename = "confirm-delay", default = "default_confirm_delay")]
    pub confirm_delay: u64,

    /// How often the announcer checks for a pending batch (seconds)
    #[serde(rename = "poll-interval", default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Refuse to deliver while the seen set is smaller than this
    #[serde(rename = "min-seen-entries", default)]
    pub min_seen_entries: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            confirm_attempts: default_confirm_attempts(),
            confirm_delay: default_confirm_delay(),
            poll_interval: default_poll_interval(),
            min_seen_entries: 0,
        }
    }
}

/// Delivery channel selection
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChannelConfig {
    /// JSON-lines outbox files, one per feed
    File {
        directory: String,
        #[serde(rename = "search-window", default = "default_search_window")]
        search_window: usize,
    },

    /// HTTP webhook endpoints, one per feed
    Webhook {
        #[serde(rename = "main-url")]
        main_url: String,
        #[serde(rename = "restricted-url")]
        restricted_url: String,
        #[serde(rename = "search-window", default = "default_search_window")]
        search_window: usize,
    },
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database shared by crawler and announcer
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_pages() -> u32 {
    500
}

fn default_cycle_interval() -> u64 {
    600
}

fn default_max_new_per_cycle() -> usize {
    10_000
}

fn default_page_size() -> u32 {
    50
}

fn default_image_selector() -> String {
    "td.borderClass img".to_string()
}

fn default_synopsis_selector() -> String {
    "[itemprop=\"description\"]".to_string()
}

fn default_info_label_selector() -> String {
    "span.dark_text".to_string()
}

fn default_extension_base() -> u32 {
    5
}

fn default_extension_growth() -> u32 {
    10
}

fn default_extension_max() -> u32 {
    20
}

fn default_confirm_attempts() -> u32 {
    3
}

fn default_confirm_delay() -> u64 {
    2000
}

fn default_poll_interval() -> u64 {
    180
}

fn default_search_window() -> usize {
    1000
}

/// Shallow every cycle, then medium, deep and full on longer cadences
pub fn default_tiers() -> Vec<TierConfig> {
    vec![
        TierConfig {
            pages: 2,
            interval_minutes: 0,
        },
        TierConfig {
            pages: 12,
            interval_minutes: 6 * 60,
        },
        TierConfig {
            pages: 25,
            interval_minutes: 24 * 60,
        },
        TierConfig {
            pages: 50,
            interval_minutes: 2 * 24 * 60,
        },
    ]
}
