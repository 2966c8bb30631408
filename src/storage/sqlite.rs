//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::exhaustion::ExhaustionKind;
use crate::model::{AppData, SearchSession, TabRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageResult};
use crate::storage::{from_db_time, to_db_time};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
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

fn write_session(tx: &Transaction<'_>, session: &SearchSession) -> StorageResult<()> {
    let app_data = serde_json::to_string(&session.app_data)?;
    tx.execute(
        "INSERT INTO session_state
         (id, is_search_active, active_search_tab_id, app_data, app_data_timestamp, updated_at)
         VALUES (1, ?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            is_search_active = excluded.is_search_active,
            active_search_tab_id = excluded.active_search_tab_id,
            app_data = excluded.app_data,
            app_data_timestamp = excluded.app_data_timestamp,
            updated_at = excluded.updated_at",
        params![
            session.is_active(),
            session.active_tab_id(),
            app_data,
            session.app_data_timestamp,
            to_db_time(&Utc::now()),
        ],
    )?;
    Ok(())
}

fn write_tabs(tx: &Transaction<'_>, tabs: &[TabRecord]) -> StorageResult<()> {
    tx.execute("DELETE FROM registered_tabs", [])?;
    let mut stmt =
        tx.prepare("INSERT INTO registered_tabs (tab_id, last_active_at, seq) VALUES (?1, ?2, ?3)")?;
    for tab in tabs {
        stmt.execute(params![
            tab.tab_id,
            to_db_time(&tab.last_active_at),
            tab.seq as i64
        ])?;
    }
    Ok(())
}

impl Storage for SqliteStorage {
    // ===== Session =====

    fn load_session(&self) -> StorageResult<Option<SearchSession>> {
        let row: Option<(bool, Option<i64>, String, i64)> = self
            .conn
            .query_row(
                "SELECT is_search_active, active_search_tab_id, app_data, app_data_timestamp
                 FROM session_state WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((is_active, active_tab_id, app_data, timestamp)) = row else {
            return Ok(None);
        };

        let app_data: AppData = serde_json::from_str(&app_data)?;
        Ok(Some(SearchSession::restore(
            is_active,
            active_tab_id,
            app_data,
            timestamp,
        )))
    }

    // ===== Tabs =====

    fn load_tabs(&self) -> StorageResult<Vec<TabRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT tab_id, last_active_at, seq FROM registered_tabs ORDER BY seq ASC")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(tab_id, last_active_at, seq)| {
                Ok(TabRecord {
                    tab_id,
                    last_active_at: from_db_time(&last_active_at)?,
                    seq: seq.max(0) as u64,
                })
            })
            .collect()
    }

    fn save_snapshot(
        &mut self,
        session: &SearchSession,
        tabs: &[TabRecord],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        write_session(&tx, session)?;
        write_tabs(&tx, tabs)?;
        tx.commit()?;
        Ok(())
    }

    // ===== Exhaustion =====

    fn load_exhausted(
        &self,
        kind: ExhaustionKind,
    ) -> StorageResult<HashMap<String, DateTime<Utc>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, expires_at FROM exhausted_entries WHERE kind = ?1")?;

        let rows = stmt
            .query_map(params![kind.to_db_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = HashMap::with_capacity(rows.len());
        for (key, expires_at) in rows {
            entries.insert(key, from_db_time(&expires_at)?);
        }
        Ok(entries)
    }

    fn upsert_exhausted(
        &mut self,
        kind: ExhaustionKind,
        key: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO exhausted_entries (kind, key, expires_at) VALUES (?1, ?2, ?3)",
            params![kind.to_db_string(), key, to_db_time(&expires_at)],
        )?;
        Ok(())
    }

    fn purge_exhausted(
        &mut self,
        kind: ExhaustionKind,
        now: DateTime<Utc>,
    ) -> StorageResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM exhausted_entries WHERE kind = ?1 AND expires_at <= ?2",
            params![kind.to_db_string(), to_db_time(&now)],
        )?;
        Ok(removed)
    }

    // ===== Maintenance =====

    fn clear_all(&mut self) -> StorageResult<()> {
        self.conn.execute_batch(
            "
            DELETE FROM session_state;
            DELETE FROM registered_tabs;
            DELETE FROM exhausted_entries;
        ",
        )?;
        Ok(())
    }
}
