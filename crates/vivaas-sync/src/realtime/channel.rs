//! # Change Channel
//!
//! Row-change events and the subscription handle that owns the push
//! channel delivering them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::gateway::ProductRow;

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A server-pushed row change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// New row snapshot (insert / update).
    pub new: Option<ProductRow>,
    /// Old row snapshot (update / delete). Often only the primary key.
    pub old: Option<Value>,
    pub commit_timestamp: Option<String>,
}

impl ChangeEvent {
    /// Id of the old row, if the payload carried one.
    pub fn old_id(&self) -> Option<&str> {
        self.old.as_ref()?.get("id")?.as_str()
    }

    /// Id of whichever row this event is about.
    pub fn row_id(&self) -> Option<&str> {
        self.new
            .as_ref()
            .map(|row| row.id.as_str())
            .or_else(|| self.old_id())
    }
}

// =============================================================================
// Subscription Handle
// =============================================================================

/// An open push channel.
///
/// Dropping the handle signals the channel task to leave and close. Use
/// [`unsubscribe`](Self::unsubscribe) to also wait until it has.
#[derive(Debug)]
pub struct ChangeSubscription {
    topic: String,
    events: mpsc::Receiver<ChangeEvent>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ChangeSubscription {
    pub fn new(
        topic: String,
        events: mpsc::Receiver<ChangeEvent>,
        shutdown_tx: oneshot::Sender<()>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        ChangeSubscription {
            topic,
            events,
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next change, or `None` once the channel task has stopped.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Leaves the channel and waits for its task to finish.
    pub async fn unsubscribe(mut self) {
        self.signal_shutdown();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                debug!(?e, topic = %self.topic, "Channel task ended abnormally");
            }
        }
    }

    fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}
