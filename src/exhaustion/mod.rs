//! Exhaustion cache
//!
//! Jobs and job/schedule pairs that were just tried are excluded from
//! selection for a short time-to-live so the poller moves on to something
//! else. Entries live in the profile's storage; expired entries are purged
//! every time a set is loaded and never suppress a candidate once
//! `now >= expires_at`.

use crate::storage::{Storage, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default time-to-live of an exhaustion entry
pub const DEFAULT_EXHAUSTION_TTL: Duration = Duration::from_secs(120);

/// Which exclusion set an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExhaustionKind {
    /// Keyed by job id
    Job,
    /// Keyed by `"jobId-scheduleId"`
    JobSchedulePair,
}

impl ExhaustionKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::JobSchedulePair => "pair",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "job" => Some(Self::Job),
            "pair" => Some(Self::JobSchedulePair),
            _ => None,
        }
    }

    /// Name of the logical storage key this set is exposed under
    pub fn storage_key(&self) -> &'static str {
        match self {
            Self::Job => "exhaustedJobIds",
            Self::JobSchedulePair => "exhaustedJobSchedulePairs",
        }
    }
}

/// A purged, point-in-time view of one exclusion set
#[derive(Debug, Clone)]
pub struct ExhaustionSet {
    entries: HashMap<String, DateTime<Utc>>,
    now: DateTime<Utc>,
}

impl ExhaustionSet {
    /// Builds a view, dropping entries with `expires_at <= now`
    pub fn new(mut entries: HashMap<String, DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        entries.retain(|_, expires_at| *expires_at > now);
        Self { entries, now }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|expires_at| *expires_at > self.now)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live entries sorted by expiry
    pub fn entries(&self) -> Vec<(&str, DateTime<Utc>)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(key, expires_at)| (key.as_str(), *expires_at))
            .collect();
        entries.sort_by_key(|(_, expires_at)| *expires_at);
        entries
    }
}

/// Durable TTL exclusion store
///
/// Cloning shares the underlying storage.
pub struct ExhaustionStore<S> {
    storage: Arc<Mutex<S>>,
    ttl: Duration,
}

impl<S> Clone for ExhaustionStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            ttl: self.ttl,
        }
    }
}

impl<S: Storage> ExhaustionStore<S> {
    pub fn new(storage: Arc<Mutex<S>>, ttl: Duration) -> Self {
        Self { storage, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Loads one set as of `now`, purging expired entries first
    pub fn load(&self, kind: ExhaustionKind, now: DateTime<Utc>) -> StorageResult<ExhaustionSet> {
        let mut storage = self.storage.lock().map_err(|_| StorageError::Poisoned)?;
        let purged = storage.purge_exhausted(kind, now)?;
        if purged > 0 {
            tracing::debug!("Purged {} expired {} entries", purged, kind.storage_key());
        }
        let entries = storage.load_exhausted(kind)?;
        Ok(ExhaustionSet::new(entries, now))
    }

    /// Checks a single key as of `now`
    pub fn is_exhausted(
        &self,
        kind: ExhaustionKind,
        key: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        Ok(self.load(kind, now)?.contains(key))
    }

    /// Marks a key exhausted for the store's TTL, returning its expiry
    pub fn mark_exhausted(
        &self,
        kind: ExhaustionKind,
        key: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<DateTime<Utc>> {
        self.mark_exhausted_for(kind, key, self.ttl, now)
    }

    /// Marks a key exhausted for an explicit TTL
    pub fn mark_exhausted_for(
        &self,
        kind: ExhaustionKind,
        key: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> StorageResult<DateTime<Utc>> {
        let ttl =
            chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut storage = self.storage.lock().map_err(|_| StorageError::Poisoned)?;
        storage.upsert_exhausted(kind, key, expires_at)?;
        tracing::debug!(%key, %expires_at, "Marked {} entry exhausted", kind.storage_key());
        Ok(expires_at)
    }

    /// Purges expired entries of both kinds, returning the total removed
    pub fn purge_expired(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let mut storage = self.storage.lock().map_err(|_| StorageError::Poisoned)?;
        let mut removed = 0;
        for kind in [ExhaustionKind::Job, ExhaustionKind::JobSchedulePair] {
            removed += storage.purge_exhausted(kind, now)?;
        }
        Ok(removed)
    }
}
