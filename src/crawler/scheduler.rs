//! Scan-tier scheduler
//!
//! This module decides how deep each crawl cycle scans:
//! - Tiers are ordered by depth, each with a coverage cadence
//! - The deepest overdue tier wins; otherwise the shallowest runs
//! - A finished scan stamps every tier it covered

use crate::config::TierConfig;
use crate::state::{Coverage, ScanState};
use chrono::{DateTime, Duration, Utc};

/// Longest representable cadence (a century)
const MAX_INTERVAL_MINUTES: u64 = 100 * 365 * 24 * 60;

/// A scan depth together with how often it must be fully covered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    /// Number of listing pages, counted from the newest
    pub pages: u32,

    /// Maximum age of this tier's last coverage
    pub interval: Duration,
}

impl Tier {
    /// Returns true if the tier must be scanned at `now`
    ///
    /// A tier that was never covered is always due.
    pub fn is_due(&self, state: &ScanState, now: DateTime<Utc>) -> bool {
        match state.last_covered(self.pages) {
            Some(covered_at) => now - covered_at >= self.interval,
            None => true,
        }
    }
}

impl From<TierConfig> for Tier {
    fn from(config: TierConfig) -> Self {
        let minutes = config.interval_minutes.min(MAX_INTERVAL_MINUTES) as i64;
        Self {
            pages: config.pages,
            interval: Duration::minutes(minutes),
        }
    }
}

/// Picks the tier for each cycle and records coverage afterwards
#[derive(Debug, Clone)]
pub struct Scheduler {
    /// Sorted by depth, shallowest first; never empty
    tiers: Vec<Tier>,
}

impl Scheduler {
    /// Creates a scheduler from configured tiers
    ///
    /// Tiers are sorted by depth. An empty list falls back to a single
    /// one-page tier that is due every cycle.
    pub fn new(tiers: Vec<TierConfig>) -> Self {
        let mut tiers: Vec<Tier> = tiers.into_iter().map(Tier::from).collect();
        tiers.sort_by_key(|t| t.pages);
        tiers.dedup_by_key(|t| t.pages);

        if tiers.is_empty() {
            tiers.push(Tier {
                pages: 1,
                interval: Duration::zero(),
            });
        }

        Self { tiers }
    }

    /// Configured tiers, shallowest first
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Selects the deepest due tier, or the shallowest if none is due
    pub fn select(&self, state: &ScanState, now: DateTime<Utc>) -> Tier {
        let shallowest = self.tiers[0];
        self.tiers
            .iter()
            .rev()
            .find(|tier| tier.is_due(state, now))
            .copied()
            .unwrap_or(shallowest)
    }

    /// Stamps every tier covered by a finished scan with `started_at`
    ///
    /// Returns the depths of the stamped tiers.
    pub fn record_coverage(
        &self,
        state: &mut ScanState,
        coverage: Coverage,
        started_at: DateTime<Utc>,
    ) -> Vec<u32> {
        let mut stamped = Vec::new();
        for tier in self.tiers.iter().filter(|t| coverage.covers(t.pages)) {
            state.set_covered(tier.pages, started_at);
            stamped.push(tier.pages);
        }
        stamped
    }
}
