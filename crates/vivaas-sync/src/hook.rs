//! # Products View Adapter
//!
//! Owns the reactive products state the inventory and billing screens
//! render, and keeps it current from the realtime feed.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  isAuthenticated:  unknown ──first session check──► authenticated      │
//! │                                         │                               │
//! │                                         └──────────► unauthenticated    │
//! │                                              (one dev auto-login try)   │
//! │                                                                         │
//! │  isLoading:        true ──initial fetch settles (ok or not)──► false   │
//! │                                                                         │
//! │  products:         replaced by the initial fetch, then merged with     │
//! │                    every realtime change until shutdown. The channel   │
//! │                    opens before the fetch; changes that land while it  │
//! │                    is in flight are replayed over the fetched rows.    │
//! │                                                                         │
//! │  error:            last fetch/auth error, or null                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use ts_rs::TS;
use vivaas_core::{Notification, Product};

use crate::config::{DevSettings, InventoryConfig};
use crate::error::{SyncError, SyncResult};
use crate::gateway::RemoteProductGateway;
use crate::realtime::{merge_change, ChangeHandler, ProductChange, RealtimeFeed};
use crate::service::ProductSyncService;

// =============================================================================
// State
// =============================================================================

/// Tri-state auth status. `Unknown` only before the first session check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum AuthState {
    #[default]
    Unknown,
    Authenticated,
    Unauthenticated,
}

impl AuthState {
    fn from_bool(authenticated: bool) -> Self {
        if authenticated {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        }
    }
}

/// What the screens render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductsState {
    pub products: Vec<Product>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub is_authenticated: AuthState,
}

impl Default for ProductsState {
    fn default() -> Self {
        ProductsState {
            products: Vec::new(),
            is_loading: true,
            error: None,
            is_authenticated: AuthState::Unknown,
        }
    }
}

/// Realtime changes held back while a load is in flight.
#[derive(Debug, Default)]
struct PendingChanges {
    buffering: bool,
    changes: Vec<ProductChange>,
}

// =============================================================================
// Adapter
// =============================================================================

/// Products view adapter.
///
/// ## Usage
/// ```rust,ignore
/// let mut sync = ProductsSync::new(service, &config);
/// let mut state_rx = sync.subscribe();
/// sync.start().await;
///
/// while state_rx.changed().await.is_ok() {
///     render(&state_rx.borrow());
/// }
/// ```
pub struct ProductsSync<G: RemoteProductGateway + 'static> {
    service: ProductSyncService<G>,
    feed: RealtimeFeed<G>,
    state_tx: Arc<watch::Sender<ProductsState>>,
    /// Lock order: `pending`, then `state_tx`.
    pending: Arc<Mutex<PendingChanges>>,
    realtime_enabled: bool,
    #[cfg_attr(not(feature = "dev-auto-login"), allow(dead_code))]
    dev: DevSettings,
    #[cfg_attr(not(feature = "dev-auto-login"), allow(dead_code))]
    dev_login_attempted: bool,
}

impl<G: RemoteProductGateway + 'static> ProductsSync<G> {
    pub fn new(service: ProductSyncService<G>, config: &InventoryConfig) -> Self {
        let feed = RealtimeFeed::new(
            service.gateway().clone(),
            config.backend.table.clone(),
            service.notifier().clone(),
        );
        let (state_tx, _) = watch::channel(ProductsState::default());

        ProductsSync {
            service,
            feed,
            state_tx: Arc::new(state_tx),
            pending: Arc::new(Mutex::new(PendingChanges::default())),
            realtime_enabled: config.realtime.enabled,
            dev: config.dev.clone(),
            dev_login_attempted: false,
        }
    }

    /// The service behind this adapter, for mutations.
    pub fn service(&self) -> &ProductSyncService<G> {
        &self.service
    }

    /// Current state snapshot.
    pub fn state(&self) -> ProductsState {
        self.state_tx.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ProductsState> {
        self.state_tx.subscribe()
    }

    pub fn is_realtime_active(&self) -> bool {
        self.feed.is_active()
    }

    /// Session check, realtime, then the initial fetch.
    pub async fn start(&mut self) {
        let mut authenticated = self.service.check_session().await;
        if !authenticated {
            authenticated = self.try_dev_auto_login().await;
        }
        self.set_auth(authenticated);

        if !authenticated {
            self.service.notifier().notify(Notification::login_required());
        }

        self.hold_changes();
        self.resubscribe().await;
        self.load(authenticated).await;
    }

    /// Re-checks the session after a sign-in or sign-out.
    pub async fn on_auth_changed(&mut self) {
        let authenticated = self.service.check_session().await;
        self.set_auth(authenticated);
        if authenticated {
            self.hold_changes();
            self.resubscribe().await;
            self.load(true).await;
        } else {
            self.resubscribe().await;
            self.state_tx.send_modify(|state| {
                state.error = Some(SyncError::AuthRequired.to_string());
            });
        }
    }

    /// Signs in, then reloads and resubscribes.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> SyncResult<()> {
        self.service.sign_in(email, password).await?;
        self.on_auth_changed().await;
        Ok(())
    }

    /// Closes the realtime channel.
    pub async fn shutdown(&mut self) {
        self.feed.stop().await;
        info!("Products sync stopped");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn set_auth(&self, authenticated: bool) {
        self.state_tx.send_modify(|state| {
            state.is_authenticated = AuthState::from_bool(authenticated);
        });
    }

    async fn load(&self, authenticated: bool) {
        let listing = self.service.list_products().await;

        let error = match listing.error() {
            Some(reason) => {
                if authenticated {
                    self.service.notifier().notify(Notification::load_failed());
                }
                Some(format!("Failed to load products: {reason}"))
            }
            None if !authenticated => Some(SyncError::AuthRequired.to_string()),
            None => None,
        };

        debug!(
            count = listing.products.len(),
            from_cache = listing.is_from_cache(),
            "Initial product load settled"
        );
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let replayed = std::mem::take(&mut pending.changes);
        pending.buffering = false;
        if !replayed.is_empty() {
            debug!(count = replayed.len(), "Replaying changes received during load");
        }
        self.state_tx.send_modify(|state| {
            state.products = listing.products;
            for change in &replayed {
                merge_change(&mut state.products, change);
            }
            state.is_loading = false;
            state.error = error;
        });
    }

    /// Buffers realtime changes until the next load has been applied.
    fn hold_changes(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.buffering = true;
        pending.changes.clear();
    }

    async fn resubscribe(&mut self) {
        if !self.realtime_enabled {
            return;
        }
        let state_tx = self.state_tx.clone();
        let pending = self.pending.clone();
        let handler: ChangeHandler = Arc::new(move |change| {
            let mut pending = pending.lock().unwrap_or_else(PoisonError::into_inner);
            if pending.buffering {
                pending.changes.push(change.clone());
            } else {
                state_tx.send_modify(|state| merge_change(&mut state.products, change));
            }
        });
        if let Err(e) = self.feed.on_auth_changed(handler).await {
            warn!(error = %e, "Realtime feed unavailable");
        }
    }

    #[cfg(feature = "dev-auto-login")]
    async fn try_dev_auto_login(&mut self) -> bool {
        if self.dev_login_attempted || !self.dev.auto_login {
            return false;
        }
        self.dev_login_attempted = true;

        if !cfg!(debug_assertions) {
            warn!("Development auto-login is disabled in release builds");
            return false;
        }
        let Some((email, password)) = self.dev.credentials() else {
            return false;
        };

        warn!(%email, "Attempting development auto-login");
        match self.service.sign_in(email, password).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Development auto-login failed");
                false
            }
        }
    }

    #[cfg(not(feature = "dev-auto-login"))]
    async fn try_dev_auto_login(&mut self) -> bool {
        false
    }
}
