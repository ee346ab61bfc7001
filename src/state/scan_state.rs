//! Per-tier coverage timestamps
//!
//! Each tier is identified by its depth in pages. A tier's timestamp is the
//! start time of the last cycle that scanned at least that many pages.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// How far a finished scan reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// The first `n` listing pages were scanned
    Pages(u32),

    /// The scan ran past the last listing page
    EndOfCatalog,
}

impl Coverage {
    /// Returns true if a tier of `pages` depth was fully scanned
    pub fn covers(&self, pages: u32) -> bool {
        match self {
            Self::Pages(depth) => pages <= *depth,
            Self::EndOfCatalog => true,
        }
    }
}

/// Last-covered timestamps, ordered by tier depth
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanState {
    covered: BTreeMap<u32, DateTime<Utc>>,
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    /// When the tier of `pages` depth was last fully covered
    pub fn last_covered(&self, pages: u32) -> Option<DateTime<Utc>> {
        self.covered.get(&pages).copied()
    }

    /// Stamps a tier as covered at `at`
    pub fn set_covered(&mut self, pages: u32, at: DateTime<Utc>) {
        self.covered.insert(pages, at);
    }

    /// Iterates `(tier pages, covered at)` from shallowest to deepest
    pub fn iter(&self) -> impl Iterator<Item = (u32, DateTime<Utc>)> + '_ {
        self.covered.iter().map(|(pages, at)| (*pages, *at))
    }

    pub fn is_empty(&self) -> bool {
        self.covered.is_empty()
    }
}

impl FromIterator<(u32, DateTime<Utc>)> for ScanState {
    fn from_iter<I: IntoIterator<Item = (u32, DateTime<Utc>)>>(iter: I) -> Self {
        Self {
            covered: iter.into_iter().collect(),
        }
    }
}
