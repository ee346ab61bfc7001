//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{PendingItem, ScanState};
use crate::storage::{CycleRecord, CycleStatus, SeenOrigin};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Cycle not found: {0}")]
    CycleNotFound(i64),

    #[error("Handoff queue busy: {pending} entries not yet drained")]
    QueueBusy { pending: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every mutating call is durable when it returns: callers rely on that to
/// commit seen ids one at a time.
pub trait Storage {
    // ===== Seen Set =====

    /// Returns true if the id was already confirmed delivered
    fn is_seen(&self, entry_id: &str) -> StorageResult<bool>;

    /// Loads the whole seen set
    fn load_seen(&self) -> StorageResult<HashSet<String>>;

    /// Adds one id to the seen set
    ///
    /// Returns false if it was already present.
    fn mark_seen(&mut self, entry_id: &str, origin: SeenOrigin) -> StorageResult<bool>;

    /// Adds many ids at once, returning how many were new
    fn import_seen(&mut self, entry_ids: &[String]) -> StorageResult<usize>;

    /// Number of ids in the seen set
    fn count_seen(&self) -> StorageResult<u64>;

    /// All seen ids, numeric ids in numeric order, for stable exports
    fn sorted_seen(&self) -> StorageResult<Vec<String>>;

    // ===== Scan State =====

    /// Loads per-tier coverage timestamps
    fn load_scan_state(&self) -> StorageResult<ScanState>;

    /// Replaces per-tier coverage timestamps
    fn save_scan_state(&mut self, state: &ScanState) -> StorageResult<()>;

    // ===== Pending Batch =====

    /// Number of entries waiting for delivery
    fn pending_len(&self) -> StorageResult<usize>;

    /// Stores a batch atomically
    ///
    /// Fails with `StorageError::QueueBusy` while a previous batch is still
    /// pending, leaving that batch untouched.
    fn publish_pending(&mut self, items: &[PendingItem]) -> StorageResult<()>;

    /// Removes and returns the pending batch in publish order
    fn drain_pending(&mut self) -> StorageResult<Vec<PendingItem>>;

    // ===== Cycle History =====

    /// Records the start of a crawl cycle, returning its id
    fn create_cycle(
        &mut self,
        config_hash: &str,
        tier_pages: u32,
        started_at: DateTime<Utc>,
    ) -> StorageResult<i64>;

    /// Records how a crawl cycle ended
    fn finish_cycle(
        &mut self,
        cycle_id: i64,
        status: CycleStatus,
        scanned_pages: u32,
        new_entries: u32,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    /// Gets a cycle by ID
    fn get_cycle(&self, cycle_id: i64) -> StorageResult<CycleRecord>;

    /// Most recent cycles, newest first
    fn recent_cycles(&self, limit: usize) -> StorageResult<Vec<CycleRecord>>;
}
