//! Tab-side runtime
//!
//! A `TabAgent` is the part of a tab that talks to the coordinator. It starts
//! and stops the tab's poll loop when told to, keeps the tab's copy of the
//! preferences current, and reports back once the loop acquires a schedule.

use crate::client::JobSource;
use crate::coordinator::{CoordinatorHandle, Message, Reply};
use crate::exhaustion::ExhaustionStore;
use crate::model::{AppData, TabId};
use crate::poller::{Acquisition, PollLoop, PollSettings, PollState, StopReason};
use crate::storage::Storage;
use crate::CoordinatorResult;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// How an agent's run ended
#[derive(Debug, Clone, PartialEq)]
pub enum TabOutcome {
    /// The poll loop found a schedule and the tab navigated to it
    Acquired(Acquisition),
    /// The shutdown token fired
    Shutdown,
    /// The coordinator closed the tab's inbox
    Disconnected,
}

struct RunningLoop {
    generation: u64,
    cancel: CancellationToken,
    state: watch::Receiver<PollState>,
}

pub struct TabAgent<C, S> {
    tab_id: TabId,
    url: String,
    coordinator: CoordinatorHandle,
    inbox: mpsc::UnboundedReceiver<Message>,
    source: Arc<C>,
    exhaustion: ExhaustionStore<S>,
    settings: PollSettings,
    app_data: watch::Sender<AppData>,
    app_data_timestamp: Option<i64>,
    running: Option<RunningLoop>,
    generation: u64,
    stopped_tx: mpsc::UnboundedSender<(u64, StopReason)>,
    stopped: mpsc::UnboundedReceiver<(u64, StopReason)>,
}

impl<C, S> TabAgent<C, S>
where
    C: JobSource + 'static,
    S: Storage + Send + 'static,
{
    pub fn new(
        tab_id: TabId,
        url: impl Into<String>,
        coordinator: CoordinatorHandle,
        inbox: mpsc::UnboundedReceiver<Message>,
        source: Arc<C>,
        exhaustion: ExhaustionStore<S>,
        settings: PollSettings,
    ) -> Self {
        let (app_data, _) = watch::channel(AppData::default());
        let (stopped_tx, stopped) = mpsc::unbounded_channel();
        Self {
            tab_id,
            url: url.into(),
            coordinator,
            inbox,
            source,
            exhaustion,
            settings,
            app_data,
            app_data_timestamp: None,
            running: None,
            generation: 0,
            stopped_tx,
            stopped,
        }
    }

    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_polling(&self) -> bool {
        self.running.is_some()
    }

    /// State of the running poll loop, if any
    pub fn poll_state(&self) -> Option<PollState> {
        self.running.as_ref().map(|r| r.state.borrow().clone())
    }

    pub fn app_data(&self) -> AppData {
        self.app_data.borrow().clone()
    }

    /// Timestamp of the preferences in use, `None` until the first update
    pub fn app_data_timestamp(&self) -> Option<i64> {
        self.app_data_timestamp
    }

    /// Registers with the coordinator, returning whether this tab is active
    pub async fn register(&self) -> CoordinatorResult<bool> {
        let reply = self
            .coordinator
            .send(Some(self.tab_id), Some(&self.url), Message::RegisterTab)
            .await?;
        match reply {
            Reply::Registered { is_active } => {
                tracing::info!(tab_id = self.tab_id, is_active, "Tab registered");
                Ok(is_active)
            }
            other => Err(other.unexpected(&Message::RegisterTab)),
        }
    }

    /// Stops polling and leaves the registry
    pub async fn unregister(&mut self) -> CoordinatorResult<()> {
        self.stop_polling();
        self.coordinator
            .send(Some(self.tab_id), Some(&self.url), Message::UnregisterTab)
            .await?;
        Ok(())
    }

    /// Publishes a local preference edit
    ///
    /// The edit is stamped with a timestamp newer than anything this tab has
    /// seen, applied locally and sent to the coordinator for broadcast.
    pub async fn publish_preferences(&mut self, app_data: AppData) -> CoordinatorResult<i64> {
        let timestamp = match self.app_data_timestamp {
            Some(current) => Utc::now().timestamp_millis().max(current + 1),
            None => Utc::now().timestamp_millis(),
        };
        self.apply_app_data(app_data.clone(), timestamp);
        self.coordinator
            .send(
                Some(self.tab_id),
                Some(&self.url),
                Message::AppDataUpdate {
                    payload: app_data,
                    timestamp,
                },
            )
            .await?;
        Ok(timestamp)
    }

    /// Processes coordinator messages until acquisition, shutdown or disconnect
    pub async fn run(&mut self, shutdown: CancellationToken) -> CoordinatorResult<TabOutcome> {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.stop_polling();
                    return Ok(TabOutcome::Shutdown);
                }
                message = self.inbox.recv() => match message {
                    Some(message) => self.handle_message(message),
                    None => {
                        self.stop_polling();
                        return Ok(TabOutcome::Disconnected);
                    }
                },
                Some((generation, reason)) = self.stopped.recv() => {
                    if let Some(outcome) = self.on_loop_stopped(generation, reason).await? {
                        return Ok(outcome);
                    }
                }
            }
        }
    }

    /// Applies one coordinator message
    pub fn handle_message(&mut self, message: Message) {
        match message {
            Message::FetchStatusUpdate { is_active: true } => self.start_polling(),
            Message::FetchStatusUpdate { is_active: false } => self.stop_polling(),
            Message::AppDataUpdate { payload, timestamp } => {
                self.apply_app_data(payload, timestamp);
            }
            other => {
                tracing::debug!(tab_id = self.tab_id, kind = other.kind(), "Ignoring message");
            }
        }
    }

    /// Takes preferences newer than the tab's current ones
    fn apply_app_data(&mut self, app_data: AppData, timestamp: i64) -> bool {
        if self.app_data_timestamp.is_some_and(|current| timestamp <= current) {
            tracing::trace!(timestamp, "Ignoring stale preferences");
            return false;
        }
        self.app_data_timestamp = Some(timestamp);
        self.app_data.send_replace(app_data);
        true
    }

    fn start_polling(&mut self) {
        if self.running.is_some() {
            return;
        }

        self.generation += 1;
        let generation = self.generation;
        let cancel = CancellationToken::new();

        let mut poll_loop = PollLoop::new(
            self.source.clone(),
            self.exhaustion.clone(),
            self.app_data.subscribe(),
            self.settings.clone(),
        );
        let state = poll_loop.subscribe();

        let token = cancel.clone();
        let stopped = self.stopped_tx.clone();
        tokio::spawn(async move {
            let reason = poll_loop.run(token).await;
            let _ = stopped.send((generation, reason));
        });

        tracing::info!(tab_id = self.tab_id, "Polling started");
        self.running = Some(RunningLoop {
            generation,
            cancel,
            state,
        });
    }

    fn stop_polling(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            tracing::info!(tab_id = self.tab_id, "Polling stopped");
        }
    }

    async fn on_loop_stopped(
        &mut self,
        generation: u64,
        reason: StopReason,
    ) -> CoordinatorResult<Option<TabOutcome>> {
        if self.running.as_ref().map(|r| r.generation) != Some(generation) {
            tracing::debug!(generation, "Ignoring result of a cancelled poll loop");
            return Ok(None);
        }
        self.running = None;

        match reason {
            StopReason::Acquired(acquisition) => {
                tracing::info!(tab_id = self.tab_id, "Navigating to {}", acquisition.url);
                self.url = acquisition.url.to_string();
                self.coordinator
                    .send(Some(self.tab_id), Some(&self.url), Message::TabRedirected)
                    .await?;
                Ok(Some(TabOutcome::Acquired(acquisition)))
            }
            StopReason::Cancelled => Ok(None),
        }
    }
}
