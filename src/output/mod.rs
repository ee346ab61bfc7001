//! Output module for status reports and seen-set exports
//!
//! This module handles:
//! - Reporting the shared crawler/announcer state
//! - Exporting and importing the seen set as plain text

pub mod stats;

pub use stats::{load_statistics, print_statistics, HeraldStatistics, TierStatus};

use crate::storage::Storage;
use crate::Result;
use std::fs;
use std::path::Path;

/// Writes the seen set to `path`, one id per line in numeric order
///
/// Returns the number of ids written.
pub fn export_seen(storage: &dyn Storage, path: &Path) -> Result<usize> {
    let ids = storage.sorted_seen()?;

    let mut content = ids.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content)?;

    tracing::info!("Exported {} seen ids to {}", ids.len(), path.display());
    Ok(ids.len())
}

/// Reads ids from `path`, one per line, and adds them to the seen set
///
/// Blank lines and lines starting with `#` are ignored. Returns the number
/// of ids that were not already present.
pub fn import_seen(storage: &mut dyn Storage, path: &Path) -> Result<usize> {
    let content = fs::read_to_string(path)?;
    let ids = parse_id_list(&content);

    let added = storage.import_seen(&ids)?;
    tracing::info!(
        "Imported {} ids from {} ({} new)",
        ids.len(),
        path.display(),
        added
    );
    Ok(added)
}

fn parse_id_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}
