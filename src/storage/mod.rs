//! Storage module for the state shared by crawler and announcer
//!
//! Both roles open the same SQLite database from separate processes; it is
//! their only coordination point. It holds:
//! - the seen set (ids confirmed delivered)
//! - per-tier scan coverage
//! - the pending handoff batch
//! - the crawl cycle history

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use std::path::Path;

/// Opens (creating if needed) the storage database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Represents one crawl cycle in the database
#[derive(Debug, Clone)]
pub struct CycleRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub tier_pages: u32,
    pub scanned_pages: u32,
    pub new_entries: u32,
    pub config_hash: String,
    pub status: CycleStatus,
    pub error_message: Option<String>,
}

/// Status of a crawl cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Running,
    Completed,
    /// The previous batch was still pending; nothing was scanned or enqueued
    Skipped,
    Failed,
}

impl CycleStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "skipped" => Some(Self::Skipped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// How an id entered the seen set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeenOrigin {
    /// A delivery receipt was obtained
    Delivered,
    /// Loaded by `import-seen` (external repair)
    Imported,
}

impl SeenOrigin {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Imported => "imported",
        }
    }
}
