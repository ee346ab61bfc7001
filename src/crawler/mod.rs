//! Crawler module: the producer side of the handoff
//!
//! This module contains the crawling logic, including:
//! - Rate-limited HTTP fetching with bounded retries
//! - Listing and detail page parsing
//! - Scan-tier scheduling
//! - New-entry detection with adaptive range extension
//! - Cycle coordination

mod coordinator;
mod detector;
mod fetcher;
mod parser;
mod scheduler;
mod source;

pub use coordinator::{Coordinator, CycleOutcome, CycleReport};
pub use detector::{Detection, Detector};
pub use fetcher::{backoff_delay, build_http_client, FetchedPage, Fetcher};
pub use parser::{extract_entry_ids, normalize_synopsis, parse_entry_detail, unslugify};
pub use scheduler::{Scheduler, Tier};
pub use source::{CatalogSource, HtmlCatalog};

use crate::config::Config;
use crate::Result;

/// Runs crawl cycles against the live catalog until interrupted
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `config_hash` - Hash of the configuration file, recorded with each cycle
pub async fn run_crawler(config: Config, config_hash: String) -> Result<()> {
    let mut coordinator = Coordinator::from_config(config, config_hash)?;
    coordinator.run(crate::shutdown_on_ctrl_c()).await
}
