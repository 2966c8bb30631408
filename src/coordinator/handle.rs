//! Actor front-end for the coordinator
//!
//! The coordinator runs as a single task that owns all session state and
//! drains its mailbox one envelope at a time, so no two activation decisions
//! can interleave.

use crate::coordinator::messages::{Message, Reply};
use crate::coordinator::service::Coordinator;
use crate::coordinator::transport::TabMessenger;
use crate::model::TabId;
use crate::storage::Storage;
use crate::{CoordinatorError, CoordinatorResult};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const MAILBOX_CAPACITY: usize = 64;

/// A message plus its sender and reply slot
#[derive(Debug)]
pub struct Envelope {
    pub from: Option<TabId>,
    pub url: Option<String>,
    pub message: Message,
    pub reply: oneshot::Sender<CoordinatorResult<Reply>>,
}

/// Cloneable handle for sending messages to a running coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    mailbox: mpsc::Sender<Envelope>,
}

impl CoordinatorHandle {
    /// Sends a message and waits for the coordinator's reply
    pub async fn send(
        &self,
        from: Option<TabId>,
        url: Option<&str>,
        message: Message,
    ) -> CoordinatorResult<Reply> {
        let (reply, response) = oneshot::channel();
        let envelope = Envelope {
            from,
            url: url.map(str::to_string),
            message,
            reply,
        };
        self.mailbox
            .send(envelope)
            .await
            .map_err(|_| CoordinatorError::Closed)?;
        response.await.map_err(|_| CoordinatorError::Closed)?
    }

    /// Turns the search on or off, returning the resulting state
    pub async fn toggle_search(&self, is_active: bool) -> CoordinatorResult<bool> {
        self.request_status(Message::ToggleSearch { is_active }).await
    }

    pub async fn search_status(&self) -> CoordinatorResult<bool> {
        self.request_status(Message::GetSearchStatus).await
    }

    async fn request_status(&self, message: Message) -> CoordinatorResult<bool> {
        match self.send(None, None, message.clone()).await? {
            Reply::Status { is_active } => Ok(is_active),
            other => Err(other.unexpected(&message)),
        }
    }
}

impl<S, M> Coordinator<S, M>
where
    S: Storage + Send + 'static,
    M: TabMessenger + 'static,
{
    /// Moves the coordinator onto its own task
    ///
    /// The task ends once every handle has been dropped.
    pub fn spawn(self) -> (CoordinatorHandle, JoinHandle<()>) {
        let (mailbox, inbox) = mpsc::channel(MAILBOX_CAPACITY);
        let task = tokio::spawn(self.run(inbox));
        (CoordinatorHandle { mailbox }, task)
    }

    /// Processes envelopes until the mailbox closes
    pub async fn run(mut self, mut inbox: mpsc::Receiver<Envelope>) {
        tracing::debug!("Coordinator running");
        while let Some(envelope) = inbox.recv().await {
            let result = self
                .handle(
                    envelope.from,
                    envelope.url.as_deref(),
                    envelope.message,
                    Utc::now(),
                )
                .await;
            if let Err(e) = &result {
                tracing::debug!("Message failed: {}", e);
            }
            // The sender may have given up waiting
            let _ = envelope.reply.send(result);
        }
        tracing::debug!("Coordinator stopped");
    }
}
