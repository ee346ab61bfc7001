//! Catalog entries and their delivery routing

use serde::{Deserialize, Serialize};
use std::fmt;

/// One catalog entry as fetched during a crawl cycle
///
/// A later refresh of the same id produces a new value; stored values are
/// never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Canonical numeric identifier, kept in its textual form
    pub id: String,

    pub title: String,

    /// Airing/publication status, e.g. "Not yet aired"
    pub status: String,

    #[serde(default)]
    pub air_date: Option<String>,

    #[serde(default)]
    pub synopsis: Option<String>,

    #[serde(default)]
    pub image_url: Option<String>,

    /// Restricted entries are announced on the restricted feed
    #[serde(default)]
    pub is_restricted: bool,
}

impl CatalogEntry {
    /// The feed this entry is announced on
    pub fn target(&self) -> FeedTarget {
        if self.is_restricted {
            FeedTarget::Restricted
        } else {
            FeedTarget::Main
        }
    }
}

/// Delivery feed an entry is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedTarget {
    Main,
    Restricted,
}

impl FeedTarget {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Restricted => "restricted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "main" => Some(Self::Main),
            "restricted" => Some(Self::Restricted),
            _ => None,
        }
    }
}

impl fmt::Display for FeedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// An entry waiting in the handoff queue together with its destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingItem {
    pub entry: CatalogEntry,
    pub target: FeedTarget,
}

impl PendingItem {
    /// Queues an entry for the feed its restriction flag selects
    pub fn new(entry: CatalogEntry) -> Self {
        let target = entry.target();
        Self { entry, target }
    }

    pub fn id(&self) -> &str {
        &self.entry.id
    }
}
