//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Shiftwatch database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Coordinator search session (single row)
CREATE TABLE IF NOT EXISTS session_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    is_search_active INTEGER NOT NULL DEFAULT 0,
    active_search_tab_id INTEGER,
    app_data TEXT NOT NULL,
    app_data_timestamp INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

-- Tabs known to the coordinator
CREATE TABLE IF NOT EXISTS registered_tabs (
    tab_id INTEGER PRIMARY KEY,
    last_active_at TEXT NOT NULL,
    seq INTEGER NOT NULL
);

-- Exhausted job ids ('job') and job/schedule pairs ('pair')
CREATE TABLE IF NOT EXISTS exhausted_entries (
    kind TEXT NOT NULL,
    key TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    PRIMARY KEY (kind, key)
);

CREATE INDEX IF NOT EXISTS idx_exhausted_expiry ON exhausted_entries(kind, expires_at);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
