//! # Realtime Feed
//!
//! Turns row-change events into incremental updates of a product list.
//!
//! ## Merge Rules
//! ```text
//! ┌──────────┬────────────────────────────────────┬───────────────────────┐
//! │ Event    │ List                               │ Notification          │
//! ├──────────┼────────────────────────────────────┼───────────────────────┤
//! │ INSERT   │ append (replace if id already seen)│ "Product Added"       │
//! │ UPDATE   │ replace by id (append if unseen)   │ -                     │
//! │ DELETE   │ remove by id                       │ "Product Removed"     │
//! └──────────┴────────────────────────────────────┴───────────────────────┘
//! ```
//!
//! The feed only subscribes with a live session. Every (re)start tears down
//! the previous channel first, so auth transitions never leak channels.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vivaas_core::{Notification, Product};

use super::channel::{ChangeEvent, ChangeKind, ChangeSubscription};
use crate::error::SyncResult;
use crate::gateway::{GatewayResult, RemoteProductGateway};
use crate::notify::Notifier;

/// Callback receiving every merged change.
pub type ChangeHandler = Arc<dyn Fn(&ProductChange) + Send + Sync>;

// =============================================================================
// Product Change
// =============================================================================

/// A row change mapped to the domain.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductChange {
    Added(Product),
    Updated(Product),
    /// Id of the removed product.
    Removed(String),
}

impl ProductChange {
    /// Maps a wire event. `Ok(None)` when the payload lacks the row it needs.
    pub fn from_event(event: ChangeEvent) -> GatewayResult<Option<Self>> {
        let change = match event.kind {
            ChangeKind::Insert => match event.new {
                Some(row) => Some(ProductChange::Added(row.into_product()?)),
                None => None,
            },
            ChangeKind::Update => match event.new {
                Some(row) => Some(ProductChange::Updated(row.into_product()?)),
                None => None,
            },
            ChangeKind::Delete => event.old_id().map(|id| ProductChange::Removed(id.to_string())),
        };
        Ok(change)
    }

    /// Notification shown for this change, if any.
    pub fn notification(&self) -> Option<Notification> {
        match self {
            ProductChange::Added(product) => Some(Notification::product_added(&product.name)),
            ProductChange::Updated(_) => None,
            ProductChange::Removed(_) => Some(Notification::product_removed()),
        }
    }
}

/// Applies `change` to `products` in place.
pub fn merge_change(products: &mut Vec<Product>, change: &ProductChange) {
    match change {
        ProductChange::Added(product) | ProductChange::Updated(product) => {
            match products.iter_mut().find(|p| p.id == product.id) {
                Some(slot) => *slot = product.clone(),
                None => products.push(product.clone()),
            }
        }
        ProductChange::Removed(id) => products.retain(|p| &p.id != id),
    }
}

// =============================================================================
// Feed
// =============================================================================

struct FeedHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

/// Owns at most one realtime channel and forwards its changes.
pub struct RealtimeFeed<G: RemoteProductGateway + 'static> {
    gateway: Arc<G>,
    table: String,
    notifier: Arc<dyn Notifier>,
    active: Option<FeedHandle>,
}

impl<G: RemoteProductGateway + 'static> RealtimeFeed<G> {
    pub fn new(gateway: Arc<G>, table: impl Into<String>, notifier: Arc<dyn Notifier>) -> Self {
        RealtimeFeed {
            gateway,
            table: table.into(),
            notifier,
            active: None,
        }
    }

    /// Returns true while a channel task is running.
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .map(|h| !h.task.is_finished())
            .unwrap_or(false)
    }

    /// (Re)subscribes if a live session exists.
    ///
    /// Returns `Ok(false)` without subscribing when unauthenticated. Any
    /// previous channel is closed first in both cases.
    pub async fn start(&mut self, handler: ChangeHandler) -> SyncResult<bool> {
        self.stop().await;

        let authenticated = match self.gateway.get_session().await? {
            Some(session) => !session.is_expired(),
            None => false,
        };
        if !authenticated {
            debug!(table = %self.table, "Not authenticated, realtime feed not started");
            return Ok(false);
        }

        let subscription = self.gateway.subscribe_to_table_changes(&self.table).await?;
        info!(topic = %subscription.topic(), "Realtime feed subscribed");

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(run(subscription, shutdown_rx, handler, self.notifier.clone()));
        self.active = Some(FeedHandle { shutdown_tx, task });
        Ok(true)
    }

    /// Re-runs [`start`](Self::start) after a sign-in or sign-out.
    pub async fn on_auth_changed(&mut self, handler: ChangeHandler) -> SyncResult<bool> {
        debug!("Auth state changed, resubscribing realtime feed");
        self.start(handler).await
    }

    /// Closes the channel and waits for its task.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.active.take() {
            let _ = handle.shutdown_tx.send(()).await;
            if let Err(e) = handle.task.await {
                warn!(?e, "Realtime feed task ended abnormally");
            }
            debug!(table = %self.table, "Realtime feed stopped");
        }
    }
}

async fn run(
    mut subscription: ChangeSubscription,
    mut shutdown_rx: mpsc::Receiver<()>,
    handler: ChangeHandler,
    notifier: Arc<dyn Notifier>,
) {
    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else {
                    warn!(topic = %subscription.topic(), "Realtime channel closed");
                    break;
                };
                apply(event, &handler, notifier.as_ref());
            }

            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }

    subscription.unsubscribe().await;
}

fn apply(event: ChangeEvent, handler: &ChangeHandler, notifier: &dyn Notifier) {
    let kind = event.kind;
    let row_id = event.row_id().map(str::to_string);

    match ProductChange::from_event(event) {
        Ok(Some(change)) => {
            debug!(?kind, product_id = ?row_id, "Applying realtime change");
            handler(&change);
            if let Some(notification) = change.notification() {
                notifier.notify(notification);
            }
        }
        Ok(None) => debug!(?kind, "Realtime change without a usable row, skipped"),
        Err(e) => warn!(?kind, product_id = ?row_id, error = %e, "Undecodable realtime row"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ProductRow;
    use crate::notify::RecordingNotifier;
    use crate::testing::{sample_row, FakeGateway};
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    fn recording_handler() -> (ChangeHandler, Arc<Mutex<Vec<Product>>>) {
        let products = Arc::new(Mutex::new(Vec::new()));
        let sink = products.clone();
        let handler: ChangeHandler = Arc::new(move |change| {
            merge_change(&mut sink.lock().unwrap(), change);
        });
        (handler, products)
    }

    fn insert_event(row: ProductRow) -> ChangeEvent {
        ChangeEvent {
            kind: ChangeKind::Insert,
            new: Some(row),
            old: None,
            commit_timestamp: None,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[test]
    fn test_merge_insert_update_delete() {
        let mut products = Vec::new();
        let a = sample_row("a", "A-1", 4).into_product().unwrap();
        let mut a2 = a.clone();
        a2.stock = 9;

        merge_change(&mut products, &ProductChange::Added(a.clone()));
        merge_change(&mut products, &ProductChange::Added(a.clone()));
        assert_eq!(products.len(), 1);

        merge_change(&mut products, &ProductChange::Updated(a2));
        assert_eq!(products[0].stock, 9);

        merge_change(&mut products, &ProductChange::Removed("a".into()));
        assert!(products.is_empty());

        merge_change(&mut products, &ProductChange::Removed("missing".into()));
        assert!(products.is_empty());
    }

    #[test]
    fn test_delete_event_maps_old_id() {
        let event = ChangeEvent {
            kind: ChangeKind::Delete,
            new: None,
            old: Some(json!({ "id": "p7" })),
            commit_timestamp: None,
        };
        assert_eq!(
            ProductChange::from_event(event).unwrap(),
            Some(ProductChange::Removed("p7".into()))
        );
    }

    #[tokio::test]
    async fn test_not_authenticated_does_not_subscribe() {
        let gateway = Arc::new(FakeGateway::new());
        let mut feed = RealtimeFeed::new(gateway.clone(), "products", Arc::new(RecordingNotifier::default()));
        let (handler, _) = recording_handler();

        assert!(!feed.start(handler).await.unwrap());
        assert!(!feed.is_active());
        assert_eq!(gateway.active_channels(), 0);
    }

    #[tokio::test]
    async fn test_events_are_merged_and_notified() {
        let gateway = Arc::new(FakeGateway::signed_in());
        let notifier = Arc::new(RecordingNotifier::default());
        let mut feed = RealtimeFeed::new(gateway.clone(), "products", notifier.clone());
        let (handler, products) = recording_handler();

        assert!(feed.start(handler).await.unwrap());
        gateway.push_change(insert_event(sample_row("p1", "KRT-01", 10)));
        gateway.push_change(ChangeEvent {
            kind: ChangeKind::Delete,
            new: None,
            old: Some(json!({ "id": "p1" })),
            commit_timestamp: None,
        });
        gateway.push_change(insert_event(sample_row("p2", "KRT-02", 3)));
        settle().await;

        let ids: Vec<String> = products.lock().unwrap().iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec!["p2".to_string()]);
        assert_eq!(
            notifier.titles(),
            vec!["Product Added", "Product Removed", "Product Added"]
        );

        feed.stop().await;
    }

    #[tokio::test]
    async fn test_restart_releases_previous_channel() {
        let gateway = Arc::new(FakeGateway::signed_in());
        let mut feed = RealtimeFeed::new(gateway.clone(), "products", Arc::new(RecordingNotifier::default()));

        let (handler, _) = recording_handler();
        feed.start(handler.clone()).await.unwrap();
        feed.on_auth_changed(handler.clone()).await.unwrap();
        feed.on_auth_changed(handler).await.unwrap();
        assert_eq!(gateway.active_channels(), 1);

        feed.stop().await;
        assert_eq!(gateway.active_channels(), 0);
    }

    #[tokio::test]
    async fn test_sign_out_closes_channel() {
        let gateway = Arc::new(FakeGateway::signed_in());
        let mut feed = RealtimeFeed::new(gateway.clone(), "products", Arc::new(RecordingNotifier::default()));
        let (handler, _) = recording_handler();

        feed.start(handler.clone()).await.unwrap();
        gateway.clear_session();
        assert!(!feed.on_auth_changed(handler).await.unwrap());
        assert_eq!(gateway.active_channels(), 0);
    }
}
