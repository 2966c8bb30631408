//! The search coordinator
//!
//! Decides which single registered tab may run its poll loop. All session and
//! registry mutations happen here, one message at a time, and each one is
//! followed by a snapshot write.

use crate::config::TabsConfig;
use crate::coordinator::messages::{Message, Reply};
use crate::coordinator::registry::TabRegistry;
use crate::coordinator::transport::TabMessenger;
use crate::model::{AppData, SearchSession, TabId};
use crate::storage::{Storage, StorageError};
use crate::{CoordinatorError, CoordinatorResult};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct Coordinator<S, M> {
    session: SearchSession,
    registry: TabRegistry,
    storage: Arc<Mutex<S>>,
    messenger: M,
    active_window: Duration,
    resumed: bool,
}

impl<S, M> Coordinator<S, M>
where
    S: Storage + Send,
    M: TabMessenger,
{
    /// Restores the coordinator from storage
    ///
    /// Tabs the messenger no longer knows about are pruned. If the stored
    /// active tab was among them, another tab is promoted or the session goes
    /// inactive. `defaults` seeds the preferences when nothing was stored.
    pub async fn restore(
        storage: Arc<Mutex<S>>,
        messenger: M,
        tabs: &TabsConfig,
        defaults: AppData,
        now: DateTime<Utc>,
    ) -> CoordinatorResult<Self> {
        let (session, records) = {
            let storage = storage.lock().map_err(|_| StorageError::Poisoned)?;
            let session = storage.load_session()?;
            (session, storage.load_tabs()?)
        };

        let resumed = session.is_some();
        let session = match session {
            Some(session) => {
                tracing::info!(
                    active = session.is_active(),
                    "Restored search session with {} stored tabs",
                    records.len()
                );
                session
            }
            None => {
                tracing::info!("No stored search session, starting inactive");
                SearchSession::new(defaults, 0)
            }
        };

        let mut registry = TabRegistry::restore(tabs.target_domain.clone(), records);
        let live: HashSet<TabId> = messenger.live_tabs().into_iter().collect();
        let pruned = registry.retain_live(&live);
        if !pruned.is_empty() {
            tracing::info!("Pruned {} tabs that no longer exist: {:?}", pruned.len(), pruned);
        }

        let mut coordinator = Self {
            session,
            registry,
            storage,
            messenger,
            active_window: tabs.active_window(),
            resumed,
        };

        if let Some(active) = coordinator.session.active_tab_id() {
            if !coordinator.registry.contains(active) {
                coordinator.session.deactivate();
                coordinator.promote(now).await;
            }
        }

        coordinator.persist()?;
        Ok(coordinator)
    }

    pub fn session(&self) -> &SearchSession {
        &self.session
    }

    pub fn registry(&self) -> &TabRegistry {
        &self.registry
    }

    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    /// Whether `restore` found a stored session instead of seeding defaults
    pub fn resumed(&self) -> bool {
        self.resumed
    }

    /// Dispatches one message
    ///
    /// `from` and `url` identify the sending tab; control surface messages
    /// carry neither.
    pub async fn handle(
        &mut self,
        from: Option<TabId>,
        url: Option<&str>,
        message: Message,
        now: DateTime<Utc>,
    ) -> CoordinatorResult<Reply> {
        tracing::debug!(tab_id = ?from, kind = message.kind(), "Handling message");

        match message {
            Message::RegisterTab => {
                let tab_id = from.ok_or(CoordinatorError::MissingSender)?;
                let url = url.ok_or(CoordinatorError::MissingSender)?;
                let is_active = self.register(tab_id, url, now).await?;
                Ok(Reply::Registered { is_active })
            }
            Message::UnregisterTab => {
                let tab_id = from.ok_or(CoordinatorError::MissingSender)?;
                self.remove_tab(tab_id, now).await?;
                Ok(Reply::Ack)
            }
            Message::TabRedirected => {
                let tab_id = from.ok_or(CoordinatorError::MissingSender)?;
                self.tab_redirected(tab_id, now).await?;
                Ok(Reply::Ack)
            }
            Message::AppDataUpdate { payload, timestamp } => {
                if let Some(tab_id) = from {
                    self.registry.touch(tab_id, now);
                }
                self.apply_app_data(payload, timestamp, now).await?;
                Ok(Reply::Ack)
            }
            Message::ToggleSearch { is_active } => {
                let is_active = self.toggle(is_active, now).await?;
                Ok(Reply::Status { is_active })
            }
            Message::GetSearchStatus => Ok(Reply::Status {
                is_active: self.is_active(),
            }),
            message @ Message::FetchStatusUpdate { .. } => {
                Err(CoordinatorError::UnsupportedMessage(message.kind()))
            }
        }
    }

    /// Registers a tab and returns whether it is the active tab
    ///
    /// The tab receives the current preferences. A re-registering active tab
    /// (e.g. after a reload) is told to resume polling.
    pub async fn register(
        &mut self,
        tab_id: TabId,
        url: &str,
        now: DateTime<Utc>,
    ) -> CoordinatorResult<bool> {
        if let Err(e) = self.registry.register(tab_id, url, now) {
            tracing::warn!("Rejected registration: {}", e);
            return Err(e);
        }
        tracing::info!(tab_id, "Registered tab ({} total)", self.registry.len());

        let is_active = self.session.active_tab_id() == Some(tab_id);
        let mut delivered = self.messenger.send(tab_id, self.app_data_message()).await;
        if delivered.is_ok() && is_active {
            delivered = self
                .messenger
                .send(tab_id, Message::FetchStatusUpdate { is_active: true })
                .await;
        }

        if let Err(e) = delivered {
            self.drop_tab(tab_id, now).await;
            self.persist()?;
            return Err(e);
        }

        self.persist()?;
        Ok(is_active)
    }

    /// Removes a closed tab, promoting another if it was active
    pub async fn remove_tab(&mut self, tab_id: TabId, now: DateTime<Utc>) -> CoordinatorResult<()> {
        self.release_tab(tab_id, now).await;
        self.persist()
    }

    /// Handles a tab that navigated away, promoting another if it was active
    pub async fn tab_redirected(
        &mut self,
        tab_id: TabId,
        now: DateTime<Utc>,
    ) -> CoordinatorResult<()> {
        self.release_tab(tab_id, now).await;
        self.persist()
    }

    /// Turns the search on or off, returning the resulting state
    ///
    /// Turning on picks the most recently active registered tab. With no
    /// registered tab this fails with `NoEligibleTab` and the search stays off.
    pub async fn toggle(&mut self, on: bool, now: DateTime<Utc>) -> CoordinatorResult<bool> {
        if on {
            if self.session.is_active() {
                return Ok(true);
            }
            let promoted = self.promote(now).await;
            self.persist()?;
            match promoted {
                Some(tab_id) => {
                    tracing::info!(tab_id, "Search started");
                    Ok(true)
                }
                None => {
                    tracing::warn!("Cannot start search: no eligible tab is open");
                    Err(CoordinatorError::NoEligibleTab)
                }
            }
        } else {
            if let Some(previous) = self.session.deactivate() {
                self.notify_stop(previous).await;
                tracing::info!(tab_id = previous, "Search stopped");
            }
            self.persist()?;
            Ok(false)
        }
    }

    /// Applies newer preferences and broadcasts them to every tab
    ///
    /// Returns false if `timestamp` is not newer than the current one.
    pub async fn apply_app_data(
        &mut self,
        app_data: AppData,
        timestamp: i64,
        now: DateTime<Utc>,
    ) -> CoordinatorResult<bool> {
        if !self.session.apply_app_data(app_data, timestamp) {
            tracing::debug!(
                timestamp,
                current = self.session.app_data_timestamp,
                "Ignoring stale preferences"
            );
            return Ok(false);
        }
        tracing::info!(timestamp, "Preferences updated");

        let message = self.app_data_message();
        let mut unreachable = Vec::new();
        for tab_id in self.registry.tab_ids() {
            if let Err(e) = self.messenger.send(tab_id, message.clone()).await {
                tracing::debug!("Broadcast failed: {}", e);
                unreachable.push(tab_id);
            }
        }
        for tab_id in unreachable {
            self.drop_tab(tab_id, now).await;
        }

        self.persist()?;
        Ok(true)
    }

    fn app_data_message(&self) -> Message {
        Message::AppDataUpdate {
            payload: self.session.app_data.clone(),
            timestamp: self.session.app_data_timestamp,
        }
    }

    /// Unregisters a tab that may still be alive, telling it to stop if it
    /// was the active one
    async fn release_tab(&mut self, tab_id: TabId, now: DateTime<Utc>) {
        let was_active = self.session.active_tab_id() == Some(tab_id);
        if !self.registry.unregister(tab_id) && !was_active {
            tracing::debug!(tab_id, "Release of unknown tab");
            return;
        }
        tracing::info!(tab_id, "Tab left ({} remaining)", self.registry.len());

        if was_active {
            self.session.deactivate();
            self.notify_stop(tab_id).await;
            self.promote(now).await;
        }
    }

    /// Unregisters an unreachable tab, promoting another if it was active
    async fn drop_tab(&mut self, tab_id: TabId, now: DateTime<Utc>) {
        tracing::warn!(tab_id, "Pruning unreachable tab");
        self.registry.unregister(tab_id);
        if self.session.active_tab_id() == Some(tab_id) {
            self.session.deactivate();
            self.promote(now).await;
        }
    }

    async fn notify_stop(&self, tab_id: TabId) {
        let stop = Message::FetchStatusUpdate { is_active: false };
        if let Err(e) = self.messenger.send(tab_id, stop).await {
            tracing::debug!("Stop notification not delivered: {}", e);
        }
    }

    /// Picks the tab to activate next
    ///
    /// Tabs seen within the active window go first. When none were, any
    /// registered tab is eligible, most recently active first.
    fn next_candidate(&self, now: DateTime<Utc>) -> Option<TabId> {
        let recent = self.registry.list_active(self.active_window, now);
        match recent.first() {
            Some(tab_id) => Some(*tab_id),
            None => self.registry.by_recency().first().copied(),
        }
    }

    /// Activates the best promotion candidate
    ///
    /// Candidates that cannot be reached are pruned and the next one is tried.
    /// Leaves the session inactive and returns `None` when nobody is left.
    async fn promote(&mut self, now: DateTime<Utc>) -> Option<TabId> {
        loop {
            let Some(candidate) = self.next_candidate(now) else {
                self.session.deactivate();
                tracing::info!("No tab left to promote, search is inactive");
                return None;
            };

            let mut delivered = self.messenger.send(candidate, self.app_data_message()).await;
            if delivered.is_ok() {
                delivered = self
                    .messenger
                    .send(candidate, Message::FetchStatusUpdate { is_active: true })
                    .await;
            }

            match delivered {
                Ok(()) => {
                    self.registry.touch(candidate, now);
                    self.session.activate(candidate);
                    tracing::info!(tab_id = candidate, "Promoted tab to active");
                    return Some(candidate);
                }
                Err(e) => {
                    tracing::warn!("Promotion failed, pruning: {}", e);
                    self.registry.unregister(candidate);
                }
            }
        }
    }

    /// Writes the session and registry snapshot
    fn persist(&self) -> CoordinatorResult<()> {
        let mut storage = self.storage.lock().map_err(|_| StorageError::Poisoned)?;
        storage.save_snapshot(&self.session, &self.registry.records())?;
        Ok(())
    }
}
