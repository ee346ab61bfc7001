//! Statistics generation from the herald database
//!
//! This module provides functionality for extracting and displaying the
//! shared state of crawler and announcer.

use crate::crawler::Tier;
use crate::storage::{CycleRecord, CycleStatus, Storage};
use crate::Result;
use chrono::{DateTime, Utc};

/// Coverage status of one scan tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierStatus {
    pub pages: u32,

    /// Cadence in minutes
    pub interval_minutes: i64,

    pub last_covered: Option<DateTime<Utc>>,

    /// Whether the next cycle would consider this tier overdue
    pub due: bool,
}

/// Herald statistics summary
#[derive(Debug, Clone)]
pub struct HeraldStatistics {
    /// Ids confirmed delivered (or imported)
    pub seen_count: u64,

    /// Entries waiting for the announcer
    pub pending: usize,

    pub tiers: Vec<TierStatus>,

    /// Most recent cycles, newest first
    pub recent_cycles: Vec<CycleRecord>,
}

impl HeraldStatistics {
    /// Number of failed cycles among the recent ones
    pub fn recent_failures(&self) -> usize {
        self.recent_cycles
            .iter()
            .filter(|cycle| cycle.status == CycleStatus::Failed)
            .count()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `tiers` - Configured scan tiers, as ordered by the scheduler
/// * `cycle_limit` - How many recent cycles to include
/// * `now` - Reference time for tier due-ness
pub fn load_statistics(
    storage: &dyn Storage,
    tiers: &[Tier],
    cycle_limit: usize,
    now: DateTime<Utc>,
) -> Result<HeraldStatistics> {
    let scan_state = storage.load_scan_state()?;

    let tiers = tiers
        .iter()
        .map(|tier| TierStatus {
            pages: tier.pages,
            interval_minutes: tier.interval.num_minutes(),
            last_covered: scan_state.last_covered(tier.pages),
            due: tier.is_due(&scan_state, now),
        })
        .collect();

    Ok(HeraldStatistics {
        seen_count: storage.count_seen()?,
        pending: storage.pending_len()?,
        tiers,
        recent_cycles: storage.recent_cycles(cycle_limit)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HeraldStatistics) {
    println!("=== Catalog-Herald Status ===\n");

    println!("Overview:");
    println!("  Seen entries: {}", stats.seen_count);
    println!("  Pending handoff: {}", stats.pending);
    println!();

    println!("Scan Tiers:");
    for tier in &stats.tiers {
        let covered = tier
            .last_covered
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "  {:>4} pages every {:>5} min  last covered: {}{}",
            tier.pages,
            tier.interval_minutes,
            covered,
            if tier.due { "  (due)" } else { "" }
        );
    }
    println!();

    if stats.recent_cycles.is_empty() {
        println!("No crawl cycles recorded yet");
        return;
    }

    println!("Recent Cycles:");
    for cycle in &stats.recent_cycles {
        println!(
            "  #{} {} tier={} scanned={} new={} {}",
            cycle.id,
            cycle.started_at,
            cycle.tier_pages,
            cycle.scanned_pages,
            cycle.new_entries,
            cycle.status.to_db_string()
        );
        if let Some(message) = &cycle.error_message {
            println!("      {}", message);
        }
    }

    let failures = stats.recent_failures();
    if failures > 0 {
        println!(
            "\n{} of the last {} cycles failed",
            failures,
            stats.recent_cycles.len()
        );
    }
}
