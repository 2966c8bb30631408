//! Delivery of coordinator messages to tabs

use crate::coordinator::messages::Message;
use crate::model::TabId;
use crate::{CoordinatorError, CoordinatorResult};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Sends messages to tabs
///
/// A failed delivery means the tab is gone; the coordinator prunes it.
pub trait TabMessenger: Send + Sync {
    fn send(
        &self,
        tab_id: TabId,
        message: Message,
    ) -> impl Future<Output = CoordinatorResult<()>> + Send;

    /// Tabs that currently exist, whether registered or not
    fn live_tabs(&self) -> Vec<TabId>;
}

/// In-process messenger backed by one unbounded channel per tab
#[derive(Debug, Clone, Default)]
pub struct ChannelMessenger {
    tabs: Arc<Mutex<HashMap<TabId, mpsc::UnboundedSender<Message>>>>,
}

impl ChannelMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a tab's inbox, replacing any previous one
    pub fn connect(&self, tab_id: TabId) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut tabs) = self.tabs.lock() {
            tabs.insert(tab_id, tx);
        }
        rx
    }

    /// Closes a tab's inbox
    pub fn disconnect(&self, tab_id: TabId) {
        if let Ok(mut tabs) = self.tabs.lock() {
            tabs.remove(&tab_id);
        }
    }

    fn deliver(&self, tab_id: TabId, message: Message) -> CoordinatorResult<()> {
        let tabs = self
            .tabs
            .lock()
            .map_err(|_| CoordinatorError::UnreachableTab { tab_id })?;
        let sender = tabs
            .get(&tab_id)
            .ok_or(CoordinatorError::UnreachableTab { tab_id })?;
        sender
            .send(message)
            .map_err(|_| CoordinatorError::UnreachableTab { tab_id })
    }
}

impl TabMessenger for ChannelMessenger {
    async fn send(&self, tab_id: TabId, message: Message) -> CoordinatorResult<()> {
        tracing::trace!(tab_id, kind = message.kind(), "Delivering message");
        self.deliver(tab_id, message)
    }

    fn live_tabs(&self) -> Vec<TabId> {
        match self.tabs.lock() {
            Ok(tabs) => tabs
                .iter()
                .filter(|(_, sender)| !sender.is_closed())
                .map(|(tab_id, _)| *tab_id)
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivers_to_connected_tab() {
        let messenger = ChannelMessenger::new();
        let mut inbox = messenger.connect(1);

        messenger
            .send(1, Message::FetchStatusUpdate { is_active: true })
            .await
            .unwrap();

        assert_eq!(
            inbox.recv().await,
            Some(Message::FetchStatusUpdate { is_active: true })
        );
    }

    #[tokio::test]
    async fn test_unknown_or_closed_tab_is_unreachable() {
        let messenger = ChannelMessenger::new();
        let result = messenger.send(5, Message::RegisterTab).await;
        assert!(matches!(result, Err(CoordinatorError::UnreachableTab { tab_id: 5 })));

        let inbox = messenger.connect(6);
        drop(inbox);
        let result = messenger.send(6, Message::RegisterTab).await;
        assert!(matches!(result, Err(CoordinatorError::UnreachableTab { tab_id: 6 })));
    }

    #[test]
    fn test_live_tabs_skips_closed_inboxes() {
        let messenger = ChannelMessenger::new();
        let _one = messenger.connect(1);
        let two = messenger.connect(2);
        let _three = messenger.connect(3);
        drop(two);
        messenger.disconnect(3);

        assert_eq!(messenger.live_tabs(), vec![1]);
    }
}
