//! Registry of known tabs
//!
//! Owned by the coordinator; no other context mutates it.

use crate::coordinator::matcher::url_matches_domain;
use crate::model::{TabId, TabRecord};
use crate::{CoordinatorError, CoordinatorResult};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TabRegistry {
    target_domain: String,
    tabs: BTreeMap<TabId, TabRecord>,
    next_seq: u64,
}

impl TabRegistry {
    pub fn new(target_domain: impl Into<String>) -> Self {
        Self {
            target_domain: target_domain.into(),
            tabs: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Rebuilds a registry from persisted records
    pub fn restore(target_domain: impl Into<String>, records: Vec<TabRecord>) -> Self {
        let next_seq = records.iter().map(|r| r.seq + 1).max().unwrap_or(0);
        Self {
            target_domain: target_domain.into(),
            tabs: records.into_iter().map(|r| (r.tab_id, r)).collect(),
            next_seq,
        }
    }

    /// Registers a tab, or refreshes it if already known
    ///
    /// Fails with `UrlRejected` when `url` is not on the target domain.
    pub fn register(
        &mut self,
        tab_id: TabId,
        url: &str,
        now: DateTime<Utc>,
    ) -> CoordinatorResult<()> {
        if !url_matches_domain(&self.target_domain, url) {
            return Err(CoordinatorError::UrlRejected {
                tab_id,
                url: url.to_string(),
            });
        }

        match self.tabs.get_mut(&tab_id) {
            Some(record) => record.last_active_at = now,
            None => {
                self.tabs.insert(
                    tab_id,
                    TabRecord {
                        tab_id,
                        last_active_at: now,
                        seq: self.next_seq,
                    },
                );
                self.next_seq += 1;
            }
        }
        Ok(())
    }

    /// Removes a tab, returning true if it was registered
    pub fn unregister(&mut self, tab_id: TabId) -> bool {
        self.tabs.remove(&tab_id).is_some()
    }

    /// Refreshes a tab's `last_active_at`, returning true if it is registered
    pub fn touch(&mut self, tab_id: TabId, now: DateTime<Utc>) -> bool {
        match self.tabs.get_mut(&tab_id) {
            Some(record) => {
                record.last_active_at = now;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, tab_id: TabId) -> bool {
        self.tabs.contains_key(&tab_id)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn tab_ids(&self) -> Vec<TabId> {
        self.tabs.keys().copied().collect()
    }

    /// Tabs active within `window` of `now`, in promotion order
    ///
    /// Most recently active first; ties go to the earlier registration.
    pub fn list_active(&self, window: Duration, now: DateTime<Utc>) -> Vec<TabId> {
        let window =
            chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let cutoff = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);

        self.ordered(|record| record.last_active_at >= cutoff)
    }

    /// Every registered tab in promotion order, however long it has been idle
    pub fn by_recency(&self) -> Vec<TabId> {
        self.ordered(|_| true)
    }

    fn ordered(&self, keep: impl Fn(&TabRecord) -> bool) -> Vec<TabId> {
        let mut candidates: Vec<&TabRecord> =
            self.tabs.values().filter(|record| keep(record)).collect();
        candidates.sort_by(|a, b| {
            b.last_active_at
                .cmp(&a.last_active_at)
                .then(a.seq.cmp(&b.seq))
        });
        candidates.into_iter().map(|record| record.tab_id).collect()
    }

    /// Drops every tab not in `live`, returning the pruned ids
    pub fn retain_live(&mut self, live: &HashSet<TabId>) -> Vec<TabId> {
        let pruned: Vec<TabId> = self
            .tabs
            .keys()
            .filter(|id| !live.contains(id))
            .copied()
            .collect();
        for tab_id in &pruned {
            self.tabs.remove(tab_id);
        }
        pruned
    }

    /// Records in registration order, for persistence
    pub fn records(&self) -> Vec<TabRecord> {
        let mut records: Vec<TabRecord> = self.tabs.values().cloned().collect();
        records.sort_by_key(|record| record.seq);
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const URL: &str = "https://hiring.example.com/app";
    const WINDOW: Duration = Duration::from_millis(300_000);

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn registry() -> TabRegistry {
        TabRegistry::new("*.hiring.example.com")
    }

    #[test]
    fn test_register_rejects_off_domain_url() {
        let mut registry = registry();
        let result = registry.register(1, "https://elsewhere.example.org/", at(0));
        assert!(matches!(
            result,
            Err(CoordinatorError::UrlRejected { tab_id: 1, .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregister_refreshes_but_keeps_order() {
        let mut registry = registry();
        registry.register(1, URL, at(0)).unwrap();
        registry.register(2, URL, at(1)).unwrap();
        registry.register(1, URL, at(5)).unwrap();

        let records = registry.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tab_id, 1);
        assert_eq!(records[0].last_active_at, at(5));
        assert_eq!(records[0].seq, 0);
    }

    #[test]
    fn test_list_active_orders_by_recency() {
        let mut registry = registry();
        registry.register(1, URL, at(0)).unwrap();
        registry.register(2, URL, at(10)).unwrap();
        registry.register(3, URL, at(5)).unwrap();

        assert_eq!(registry.list_active(WINDOW, at(20)), vec![2, 3, 1]);
    }

    #[test]
    fn test_list_active_ties_broken_by_registration() {
        let mut registry = registry();
        registry.register(9, URL, at(0)).unwrap();
        registry.register(4, URL, at(0)).unwrap();
        registry.register(7, URL, at(0)).unwrap();

        assert_eq!(registry.list_active(WINDOW, at(1)), vec![9, 4, 7]);
    }

    #[test]
    fn test_list_active_excludes_stale_tabs() {
        let mut registry = registry();
        registry.register(1, URL, at(0)).unwrap();
        registry.register(2, URL, at(200)).unwrap();

        assert_eq!(registry.list_active(WINDOW, at(300)), vec![2, 1]);
        assert_eq!(registry.list_active(WINDOW, at(301)), vec![2]);

        assert!(registry.touch(1, at(301)));
        assert_eq!(registry.list_active(WINDOW, at(302)), vec![1, 2]);
    }

    #[test]
    fn test_by_recency_keeps_idle_tabs() {
        let mut registry = registry();
        registry.register(1, URL, at(0)).unwrap();
        registry.register(2, URL, at(50)).unwrap();

        assert!(registry.list_active(WINDOW, at(1000)).is_empty());
        assert_eq!(registry.by_recency(), vec![2, 1]);
    }

    #[test]
    fn test_unregister_and_touch_unknown() {
        let mut registry = registry();
        registry.register(1, URL, at(0)).unwrap();

        assert!(registry.unregister(1));
        assert!(!registry.unregister(1));
        assert!(!registry.touch(1, at(1)));
    }

    #[test]
    fn test_retain_live_prunes_dead_tabs() {
        let mut registry = registry();
        for tab_id in 1..=4 {
            registry.register(tab_id, URL, at(tab_id)).unwrap();
        }

        let live: HashSet<TabId> = [2, 4].into_iter().collect();
        let mut pruned = registry.retain_live(&live);
        pruned.sort();

        assert_eq!(pruned, vec![1, 3]);
        assert_eq!(registry.tab_ids(), vec![2, 4]);
    }

    #[test]
    fn test_restore_continues_sequence() {
        let records = vec![
            TabRecord {
                tab_id: 5,
                last_active_at: at(0),
                seq: 3,
            },
            TabRecord {
                tab_id: 6,
                last_active_at: at(0),
                seq: 8,
            },
        ];
        let mut registry = TabRegistry::restore("*.hiring.example.com", records);
        registry.register(1, URL, at(0)).unwrap();

        let records = registry.records();
        assert_eq!(records.last().unwrap().tab_id, 1);
        assert_eq!(records.last().unwrap().seq, 9);
        assert_eq!(registry.list_active(WINDOW, at(0)), vec![5, 6, 1]);
    }
}
