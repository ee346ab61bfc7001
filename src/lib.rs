//! Catalog-Herald: an incremental catalog watcher
//!
//! This crate scans a growing online catalog for newly published entries and
//! hands each one to a delivery channel, committing it as "seen" only after the
//! channel confirms the announcement is observably present.

pub mod config;
pub mod crawler;
pub mod delivery;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Main error type for Catalog-Herald operations
#[derive(Debug, Error)]
pub enum HeraldError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Delivery channel error: {0}")]
    Channel(#[from] delivery::ChannelError),

    #[error("Handoff queue still holds {pending} undelivered entries")]
    QueueBusy { pending: usize },

    #[error("Detected {count} new entries in one cycle (limit {limit}); the seen set looks damaged")]
    SuspiciousBatch { count: usize, limit: usize },

    #[error("Seen set holds only {count} ids (minimum {minimum}); refusing to deliver")]
    SeenSetTooSmall { count: u64, minimum: u64 },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HeraldError {
    /// Returns true if the error must stop a long-running loop
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_) | Self::SeenSetTooSmall { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector in config: {0}")]
    InvalidSelector(String),
}

/// Errors produced by the rate-limited fetcher
///
/// `NotFound` is permanent and never retried; it doubles as the
/// end-of-catalog marker for listing pages.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Resource not found: {url}")]
    NotFound { url: String },

    #[error("Gave up on {url} after {attempts} attempts: {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("URL disallowed by robots.txt: {url}")]
    Disallowed { url: String },

    #[error("Unusable response body from {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    /// Returns true if this error marks a missing resource
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for Catalog-Herald operations
pub type Result<T> = std::result::Result<T, HeraldError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Returns a token cancelled by the first Ctrl-C
///
/// The listener is installed right away, so a signal arriving while a cycle
/// is in progress is not lost.
pub fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing current work");
            trigger.cancel();
        }
    });
    token
}

// Re-export commonly used types
pub use config::Config;
pub use state::{CatalogEntry, FeedTarget, PendingItem, ScanState};
