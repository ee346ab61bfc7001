use crate::config::types::{
    CatalogConfig, ChannelConfig, Config, CrawlerConfig, DeliveryConfig, ExtensionConfig,
    TierConfig, UserAgentConfig,
};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_catalog_config(&config.catalog)?;
    validate_extension_config(&config.extension)?;
    validate_tiers(&config.tiers, config.crawler.max_pages)?;
    validate_delivery_config(&config.delivery)?;
    validate_channel_config(&config.channel)?;

    if config.storage.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.fetch_interval < 100 {
        return Err(ConfigError::Validation(format!(
            "fetch_interval must be >= 100ms, got {}ms",
            config.fetch_interval
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    if config.max_new_per_cycle < 1 {
        return Err(ConfigError::Validation(
            "max_new_per_cycle must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    Ok(())
}

/// Validates URL templates, paging and selectors of the catalog
fn validate_catalog_config(config: &CatalogConfig) -> Result<(), ConfigError> {
    if !config.listing_url.contains("{offset}") && !config.listing_url.contains("{page}") {
        return Err(ConfigError::Validation(format!(
            "listing_url must contain '{{offset}}' or '{{page}}', got '{}'",
            config.listing_url
        )));
    }

    if !config.detail_url.contains("{id}") {
        return Err(ConfigError::Validation(format!(
            "detail_url must contain '{{id}}', got '{}'",
            config.detail_url
        )));
    }

    validate_http_url("listing_url", &config.listing_page_url(0))?;
    validate_http_url("detail_url", &config.detail_page_url("1"))?;

    if config.page_size < 1 {
        return Err(ConfigError::Validation(
            "page_size must be >= 1".to_string(),
        ));
    }

    if !config.entry_path_prefix.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "entry_path_prefix must start with '/', got '{}'",
            config.entry_path_prefix
        )));
    }

    let mut selectors = vec![
        &config.image_selector,
        &config.synopsis_selector,
        &config.info_label_selector,
    ];
    if let Some(title) = &config.title_selector {
        selectors.push(title);
    }
    for selector in selectors {
        Selector::parse(selector)
            .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))?;
    }

    Ok(())
}

/// Validates the adaptive extension policy
fn validate_extension_config(config: &ExtensionConfig) -> Result<(), ConfigError> {
    if config.base < 1 {
        return Err(ConfigError::Validation(
            "extension base must be >= 1".to_string(),
        ));
    }

    if config.max < config.base {
        return Err(ConfigError::Validation(format!(
            "extension max ({}) must be >= base ({})",
            config.max, config.base
        )));
    }

    Ok(())
}

/// Validates scan tiers (already sorted by depth)
fn validate_tiers(tiers: &[TierConfig], max_pages: u32) -> Result<(), ConfigError> {
    if tiers.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[tier]] is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for tier in tiers {
        if tier.pages < 1 {
            return Err(ConfigError::Validation(
                "tier pages must be >= 1".to_string(),
            ));
        }

        if tier.pages > max_pages {
            return Err(ConfigError::Validation(format!(
                "tier of {} pages exceeds max_pages ({})",
                tier.pages, max_pages
            )));
        }

        if !seen.insert(tier.pages) {
            return Err(ConfigError::Validation(format!(
                "duplicate tier of {} pages",
                tier.pages
            )));
        }
    }

    Ok(())
}

/// Validates delivery verification settings
fn validate_delivery_config(config: &DeliveryConfig) -> Result<(), ConfigError> {
    if config.confirm_attempts < 1 {
        return Err(ConfigError::Validation(
            "confirm_attempts must be >= 1".to_string(),
        ));
    }

    if config.poll_interval < 1 {
        return Err(ConfigError::Validation(
            "poll_interval must be >= 1 second".to_string(),
        ));
    }

    Ok(())
}

/// Validates the delivery channel section
fn validate_channel_config(config: &ChannelConfig) -> Result<(), ConfigError> {
    match config {
        ChannelConfig::File {
            directory,
            search_window,
        } => {
            if directory.is_empty() {
                return Err(ConfigError::Validation(
                    "channel directory cannot be empty".to_string(),
                ));
            }
            validate_search_window(*search_window)
        }
        ChannelConfig::Webhook {
            main_url,
            restricted_url,
            search_window,
        } => {
            validate_http_url("main_url", main_url)?;
            validate_http_url("restricted_url", restricted_url)?;
            validate_search_window(*search_window)
        }
    }
}

fn validate_search_window(window: usize) -> Result<(), ConfigError> {
    if window < 1 {
        return Err(ConfigError::Validation(
            "search_window must be >= 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    Ok(())
}
