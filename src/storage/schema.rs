//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the SQLite backend.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- The single checkpoint: next coordinate to fetch
CREATE TABLE IF NOT EXISTS progress (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    volume INTEGER NOT NULL CHECK (volume >= 1),
    section INTEGER NOT NULL CHECK (section >= 1),
    page INTEGER NOT NULL CHECK (page >= 1),
    updated_at TEXT NOT NULL
);

-- Raw payloads, one row per coordinate
CREATE TABLE IF NOT EXISTS pages (
    volume INTEGER NOT NULL,
    section INTEGER NOT NULL,
    page INTEGER NOT NULL,
    payload TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    PRIMARY KEY (volume, section, page)
);

-- Sections skipped after exhausting retries
CREATE TABLE IF NOT EXISTS gaps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    volume INTEGER NOT NULL,
    section INTEGER NOT NULL,
    page INTEGER NOT NULL,
    attempts INTEGER NOT NULL,
    reason TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
