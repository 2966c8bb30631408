//! Storage module for persisting search state
//!
//! This module handles all durable state for one browser profile, including:
//! - The coordinator's search session (active flag, active tab, preferences)
//! - The registry of known tabs
//! - Exhausted job ids and job/schedule pairs with their expiry times

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;

/// Opens (or creates) the storage database at `path`
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::open(path)
}

/// Formats a timestamp for storage
///
/// Fixed millisecond precision with a `Z` suffix keeps string order equal to
/// chronological order, so expiry checks can run in SQL.
pub(crate) fn to_db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a timestamp written by [`to_db_time`]
pub(crate) fn from_db_time(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::CorruptRecord(format!("bad timestamp '{}': {}", value, e)))
}
