use crate::model::{AppData, TabId};
use chrono::{DateTime, Utc};

/// A registered browser tab
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabRecord {
    pub tab_id: TabId,

    /// Last registration or activation of this tab
    pub last_active_at: DateTime<Utc>,

    /// Registration order, used to break `last_active_at` ties
    pub seq: u64,
}

/// Coordinator-owned search state
///
/// The active flag is derived from `active_tab_id`, so a session can never be
/// active without a tab or hold a tab while inactive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSession {
    active_tab_id: Option<TabId>,

    /// Current preferences
    pub app_data: AppData,

    /// Logical timestamp (ms since epoch) of `app_data`
    pub app_data_timestamp: i64,
}

impl SearchSession {
    /// Creates an inactive session with the given preferences
    pub fn new(app_data: AppData, app_data_timestamp: i64) -> Self {
        Self {
            active_tab_id: None,
            app_data,
            app_data_timestamp,
        }
    }

    /// Rebuilds a session from persisted parts
    ///
    /// A stored active flag without a tab (or the reverse) collapses to inactive.
    pub fn restore(
        is_active: bool,
        active_tab_id: Option<TabId>,
        app_data: AppData,
        app_data_timestamp: i64,
    ) -> Self {
        Self {
            active_tab_id: if is_active { active_tab_id } else { None },
            app_data,
            app_data_timestamp,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active_tab_id.is_some()
    }

    pub fn active_tab_id(&self) -> Option<TabId> {
        self.active_tab_id
    }

    /// Marks `tab_id` as the single active tab
    pub fn activate(&mut self, tab_id: TabId) {
        self.active_tab_id = Some(tab_id);
    }

    /// Clears the active tab, returning the one that was active
    pub fn deactivate(&mut self) -> Option<TabId> {
        self.active_tab_id.take()
    }

    /// Applies an app-data update if `timestamp` is newer than the current one
    ///
    /// Returns true if the update was applied.
    pub fn apply_app_data(&mut self, app_data: AppData, timestamp: i64) -> bool {
        if timestamp <= self.app_data_timestamp {
            return false;
        }
        self.app_data = app_data;
        self.app_data_timestamp = timestamp;
        true
    }
}
