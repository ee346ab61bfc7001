//! Configuration module for Catalog-Herald
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use catalog_herald::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("herald.toml")).unwrap();
//! println!("Fetch interval: {}ms", config.crawler.fetch_interval);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    default_tiers, CatalogConfig, ChannelConfig, Config, CrawlerConfig, DeliveryConfig,
    ExtensionConfig, StorageConfig, TierConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
