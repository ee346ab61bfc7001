//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{CatalogEntry, FeedTarget, PendingItem, ScanState};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{CycleRecord, CycleStatus, SeenOrigin};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// How long a connection waits for the other role's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const CYCLE_COLUMNS: &str = "id, started_at, finished_at, tier_pages, scanned_pages, new_entries, config_hash, status, error_message";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    ///
    /// WAL mode lets the crawler read the seen set while the announcer
    /// commits to it from another process.
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch(
            "
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl Storage for SqliteStorage {
    // ===== Seen Set =====

    fn is_seen(&self, entry_id: &str) -> StorageResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM seen_entries WHERE entry_id = ?1",
                params![entry_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn load_seen(&self) -> StorageResult<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT entry_id FROM seen_entries")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    fn mark_seen(&mut self, entry_id: &str, origin: SeenOrigin) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO seen_entries (entry_id, seen_at, origin) VALUES (?1, ?2, ?3)",
            params![entry_id, Utc::now().to_rfc3339(), origin.to_db_string()],
        )?;
        Ok(inserted > 0)
    }

    fn import_seen(&mut self, entry_ids: &[String]) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut added = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO seen_entries (entry_id, seen_at, origin) VALUES (?1, ?2, ?3)",
            )?;
            for entry_id in entry_ids {
                added += stmt.execute(params![
                    entry_id,
                    now,
                    SeenOrigin::Imported.to_db_string()
                ])?;
            }
        }
        tx.commit()?;
        Ok(added)
    }

    fn count_seen(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM seen_entries", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn sorted_seen(&self) -> StorageResult<Vec<String>> {
        let mut ids: Vec<String> = self.load_seen()?.into_iter().collect();
        ids.sort_by(|a, b| compare_entry_ids(a, b));
        Ok(ids)
    }

    // ===== Scan State =====

    fn load_scan_state(&self) -> StorageResult<ScanState> {
        let mut stmt = self
            .conn
            .prepare("SELECT tier_pages, covered_at FROM scan_state ORDER BY tier_pages")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(pages, covered_at)| Ok((pages as u32, parse_timestamp(&covered_at)?)))
            .collect()
    }

    fn save_scan_state(&mut self, state: &ScanState) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM scan_state", [])?;
        for (pages, covered_at) in state.iter() {
            tx.execute(
                "INSERT INTO scan_state (tier_pages, covered_at) VALUES (?1, ?2)",
                params![pages as i64, covered_at.to_rfc3339()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    // ===== Pending Batch =====

    fn pending_len(&self) -> StorageResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pending_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn publish_pending(&mut self, items: &[PendingItem]) -> StorageResult<()> {
        if items.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let pending: i64 =
            tx.query_row("SELECT COUNT(*) FROM pending_entries", [], |row| row.get(0))?;
        if pending > 0 {
            return Err(StorageError::QueueBusy {
                pending: pending as usize,
            });
        }

        for (position, item) in items.iter().enumerate() {
            let payload = serde_json::to_string(&item.entry)?;
            tx.execute(
                "INSERT INTO pending_entries (position, entry_id, target, payload, enqueued_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    position as i64,
                    item.entry.id,
                    item.target.to_db_string(),
                    payload,
                    now
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn drain_pending(&mut self) -> StorageResult<Vec<PendingItem>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let rows = {
            let mut stmt = tx.prepare(
                "SELECT entry_id, target, payload FROM pending_entries ORDER BY position",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        tx.execute("DELETE FROM pending_entries", [])?;
        tx.commit()?;

        let mut items = Vec::with_capacity(rows.len());
        for (entry_id, target, payload) in rows {
            match decode_pending(&target, &payload) {
                Ok(item) => items.push(item),
                // The id is still absent from the seen set, so the next
                // crawl cycle will pick it up again.
                Err(e) => tracing::warn!("Dropping unreadable pending entry {}: {}", entry_id, e),
            }
        }

        Ok(items)
    }

    // ===== Cycle History =====

    fn create_cycle(
        &mut self,
        config_hash: &str,
        tier_pages: u32,
        started_at: DateTime<Utc>,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO cycles (started_at, tier_pages, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                started_at.to_rfc3339(),
                tier_pages as i64,
                config_hash,
                CycleStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_cycle(
        &mut self,
        cycle_id: i64,
        status: CycleStatus,
        scanned_pages: u32,
        new_entries: u32,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE cycles SET status = ?1, finished_at = ?2, scanned_pages = ?3, new_entries = ?4, error_message = ?5
             WHERE id = ?6",
            params![
                status.to_db_string(),
                Utc::now().to_rfc3339(),
                scanned_pages as i64,
                new_entries as i64,
                error_message,
                cycle_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::CycleNotFound(cycle_id));
        }
        Ok(())
    }

    fn get_cycle(&self, cycle_id: i64) -> StorageResult<CycleRecord> {
        let sql = format!("SELECT {} FROM cycles WHERE id = ?1", CYCLE_COLUMNS);
        self.conn
            .query_row(&sql, params![cycle_id], cycle_from_row)
            .optional()?
            .ok_or(StorageError::CycleNotFound(cycle_id))
    }

    fn recent_cycles(&self, limit: usize) -> StorageResult<Vec<CycleRecord>> {
        let sql = format!(
            "SELECT {} FROM cycles ORDER BY id DESC LIMIT ?1",
            CYCLE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let cycles = stmt
            .query_map(params![limit as i64], cycle_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cycles)
    }
}

fn cycle_from_row(row: &Row<'_>) -> rusqlite::Result<CycleRecord> {
    Ok(CycleRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        tier_pages: row.get::<_, i64>(3)? as u32,
        scanned_pages: row.get::<_, i64>(4)? as u32,
        new_entries: row.get::<_, i64>(5)? as u32,
        config_hash: row.get(6)?,
        status: CycleStatus::from_db_string(&row.get::<_, String>(7)?)
            .unwrap_or(CycleStatus::Failed),
        error_message: row.get(8)?,
    })
}

fn decode_pending(target: &str, payload: &str) -> StorageResult<PendingItem> {
    let target = FeedTarget::from_db_string(target)
        .ok_or_else(|| StorageError::Corrupt(format!("unknown feed target '{}'", target)))?;
    let entry: CatalogEntry = serde_json::from_str(payload)?;
    Ok(PendingItem { entry, target })
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("bad timestamp '{}': {}", value, e)))
}

/// Numeric ids sort numerically, anything else after them lexically
fn compare_entry_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
