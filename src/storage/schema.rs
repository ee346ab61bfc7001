//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Catalog-Herald database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Ids confirmed delivered (or imported by an operator)
CREATE TABLE IF NOT EXISTS seen_entries (
    entry_id TEXT PRIMARY KEY,
    seen_at TEXT NOT NULL,
    origin TEXT NOT NULL
);

-- Last full coverage per scan tier
CREATE TABLE IF NOT EXISTS scan_state (
    tier_pages INTEGER PRIMARY KEY,
    covered_at TEXT NOT NULL
);

-- The single in-flight handoff batch; empty when nothing is pending
CREATE TABLE IF NOT EXISTS pending_entries (
    position INTEGER PRIMARY KEY,
    entry_id TEXT NOT NULL,
    target TEXT NOT NULL,
    payload TEXT NOT NULL,
    enqueued_at TEXT NOT NULL
);

-- Crawl cycle history
CREATE TABLE IF NOT EXISTS cycles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    tier_pages INTEGER NOT NULL,
    scanned_pages INTEGER NOT NULL DEFAULT 0,
    new_entries INTEGER NOT NULL DEFAULT 0,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_cycles_status ON cycles(status);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
