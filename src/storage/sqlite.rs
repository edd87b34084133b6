//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the storage traits.

use crate::state::{Coordinate, RunStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{PageStore, ProgressStore, StorageError, StorageResult};
use crate::storage::{GapRecord, RunRecord};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
    current_run: Option<i64>,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            current_run: None,
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            current_run: None,
        })
    }

    /// Number of stored pages
    pub fn count_pages(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn coordinate_from_row(volume: u32, section: u32, page: u32) -> StorageResult<Coordinate> {
    Coordinate::new(volume, section, page).map_err(|e| StorageError::Corrupt {
        location: "sqlite".to_string(),
        message: e.to_string(),
    })
}

impl ProgressStore for SqliteStorage {
    fn load_progress(&self) -> StorageResult<Option<Coordinate>> {
        let row: Option<(u32, u32, u32)> = self
            .conn
            .query_row(
                "SELECT volume, section, page FROM progress WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(v, s, p)| coordinate_from_row(v, s, p))
            .transpose()
    }

    fn save_progress(&mut self, next: Coordinate) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO progress (id, volume, section, page, updated_at) VALUES (1, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET volume = excluded.volume, section = excluded.section,
             page = excluded.page, updated_at = excluded.updated_at",
            params![next.volume, next.section, next.page, now],
        )?;
        Ok(())
    }

    fn start_run(&mut self, config_hash: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        self.current_run = Some(self.conn.last_insert_rowid());
        Ok(())
    }

    fn finish_run(&mut self, status: RunStatus) -> StorageResult<()> {
        let Some(run_id) = self.current_run else {
            tracing::warn!("No run record to finish with status {}", status);
            return Ok(());
        };
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        Ok(())
    }

    fn last_run(&self) -> StorageResult<Option<RunRecord>> {
        let row: Option<(String, Option<String>, String, String)> = self
            .conn
            .query_row(
                "SELECT started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((started_at, finished_at, config_hash, status)) = row else {
            return Ok(None);
        };
        let status =
            RunStatus::from_db_string(&status).ok_or_else(|| StorageError::Corrupt {
                location: "sqlite".to_string(),
                message: format!("unknown run status '{}'", status),
            })?;

        Ok(Some(RunRecord {
            started_at,
            finished_at,
            config_hash,
            status,
        }))
    }

    fn record_gap(&mut self, gap: &GapRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO gaps (volume, section, page, attempts, reason, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                gap.coordinate.volume,
                gap.coordinate.section,
                gap.coordinate.page,
                gap.attempts,
                gap.reason,
                gap.recorded_at
            ],
        )?;
        Ok(())
    }

    fn gaps(&self) -> StorageResult<Vec<GapRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT volume, section, page, attempts, reason, recorded_at FROM gaps ORDER BY id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(v, s, p, attempts, reason, recorded_at)| {
                Ok(GapRecord {
                    coordinate: coordinate_from_row(v, s, p)?,
                    attempts,
                    reason,
                    recorded_at,
                })
            })
            .collect()
    }
}

impl PageStore for SqliteStorage {
    fn store_page(&mut self, coordinate: Coordinate, payload: &Value) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let body = serde_json::to_string(payload)?;
        self.conn.execute(
            "INSERT INTO pages (volume, section, page, payload, fetched_at) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(volume, section, page) DO UPDATE SET payload = excluded.payload,
             fetched_at = excluded.fetched_at",
            params![
                coordinate.volume,
                coordinate.section,
                coordinate.page,
                body,
                now
            ],
        )?;
        Ok(())
    }

    fn load_page(&self, coordinate: Coordinate) -> StorageResult<Option<Value>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM pages WHERE volume = ?1 AND section = ?2 AND page = ?3",
                params![coordinate.volume, coordinate.section, coordinate.page],
                |row| row.get(0),
            )
            .optional()?;

        Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
    }

    fn list_pages(&self) -> StorageResult<Vec<Coordinate>> {
        let mut stmt = self
            .conn
            .prepare("SELECT volume, section, page FROM pages ORDER BY volume, section, page")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(v, s, p)| coordinate_from_row(v, s, p))
            .collect()
    }
}
