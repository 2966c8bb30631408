//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::exhaustion::ExhaustionKind;
use crate::model::{SearchSession, TabRecord};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// One store belongs to one browser profile. The coordinator context is the
/// only writer of session and tab state; tab contexts write exhaustion
/// entries. Readers in other contexts may observe slightly stale data.
pub trait Storage {
    // ===== Session =====

    /// Loads the persisted search session, if one was ever saved
    fn load_session(&self) -> StorageResult<Option<SearchSession>>;

    // ===== Tabs =====

    /// Loads registered tabs in registration order
    fn load_tabs(&self) -> StorageResult<Vec<TabRecord>>;

    /// Saves session and tabs atomically
    fn save_snapshot(&mut self, session: &SearchSession, tabs: &[TabRecord])
        -> StorageResult<()>;

    // ===== Exhaustion =====

    /// Loads all entries of one kind, expired or not
    fn load_exhausted(&self, kind: ExhaustionKind)
        -> StorageResult<HashMap<String, DateTime<Utc>>>;

    /// Inserts or replaces an entry's expiry
    fn upsert_exhausted(
        &mut self,
        kind: ExhaustionKind,
        key: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Deletes entries with `expires_at <= now`, returning how many were removed
    fn purge_exhausted(&mut self, kind: ExhaustionKind, now: DateTime<Utc>)
        -> StorageResult<usize>;

    // ===== Maintenance =====

    /// Removes all persisted state
    fn clear_all(&mut self) -> StorageResult<()>;
}
