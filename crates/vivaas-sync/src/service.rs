//! # Product Sync Service
//!
//! Orchestrates product reads and writes against an unreliable,
//! auth-gated backend, keeping the local cache warm.
//!
//! ## Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  READS  (list_products, get_product, decrease_stock's read)            │
//! │    remote ──ok──► replace/upsert cache ──► return                       │
//! │       │                                                                 │
//! │       └─fail──► serve from cache (listing marked as Cache{error})       │
//! │                                                                         │
//! │  WRITES (add, update, decrease_stock, delete)                          │
//! │    ensure session ──► remote write ──ok──► mirror into cache           │
//! │       │                    │                                            │
//! │       │                    └─fail──► error + notification              │
//! │       └─no session──► AuthRequired (never a local-only record)         │
//! │                                                                         │
//! │  AUTH RETRY                                                            │
//! │    any remote call failing with an auth error gets exactly one         │
//! │    refresh_session() + one retry                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stock Decrease
//! The write is a compare-and-set on the stock level that was read. A lost
//! race re-runs the read-check-write, up to `stock.max_conflict_retries`
//! extra times.

use chrono::Utc;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};
use vivaas_core::{CoreError, NewProduct, Notification, Product, StockAlert, StockStatus};
use vivaas_store::LocalProductStore;

use crate::config::{InventoryConfig, StockSettings};
use crate::error::{SyncError, SyncResult};
use crate::gateway::{
    GatewayError, GatewayResult, NewProductRow, ProductPatch, ProductRow, RemoteProductGateway,
    Session, TokenClaims,
};
use crate::notify::{Notifier, TracingNotifier};

// =============================================================================
// Listing
// =============================================================================

/// Where a listing came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingOrigin {
    Remote,
    /// Remote fetch failed; `error` is the user-facing reason.
    Cache { error: String },
}

/// Result of [`ProductSyncService::list_products`].
#[derive(Debug, Clone)]
pub struct ProductListing {
    pub products: Vec<Product>,
    pub origin: ListingOrigin,
}

impl ProductListing {
    pub fn is_from_cache(&self) -> bool {
        matches!(self.origin, ListingOrigin::Cache { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.origin {
            ListingOrigin::Remote => None,
            ListingOrigin::Cache { error } => Some(error),
        }
    }
}

// =============================================================================
// Service
// =============================================================================

/// Product reads and writes with cache fallback and notifications.
pub struct ProductSyncService<G: RemoteProductGateway> {
    gateway: Arc<G>,
    cache: Arc<RwLock<LocalProductStore>>,
    notifier: Arc<dyn Notifier>,
    settings: StockSettings,
}

impl<G: RemoteProductGateway> Clone for ProductSyncService<G> {
    fn clone(&self) -> Self {
        ProductSyncService {
            gateway: self.gateway.clone(),
            cache: self.cache.clone(),
            notifier: self.notifier.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<G: RemoteProductGateway> ProductSyncService<G> {
    /// Creates a service that logs notifications.
    pub fn new(gateway: Arc<G>, config: &InventoryConfig) -> Self {
        Self::with_notifier(gateway, config, Arc::new(TracingNotifier))
    }

    /// Creates a service with a custom notifier.
    pub fn with_notifier(
        gateway: Arc<G>,
        config: &InventoryConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        ProductSyncService {
            gateway,
            cache: Arc::new(RwLock::new(LocalProductStore::new())),
            notifier,
            settings: config.stock.clone(),
        }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Snapshot of the local cache.
    pub fn cached_products(&self) -> Vec<Product> {
        self.read_cache(LocalProductStore::list)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// All products, from the backend when reachable, else from the cache.
    pub async fn list_products(&self) -> ProductListing {
        let result = self
            .with_auth_retry("list_products", || self.gateway.fetch_all())
            .await;

        match result {
            Ok(rows) => {
                let products = map_rows(rows);
                info!(count = products.len(), "Loaded products from backend");
                self.write_cache(|cache| cache.replace_all(products.clone()));
                ProductListing {
                    products,
                    origin: ListingOrigin::Remote,
                }
            }
            Err(e) => {
                let error = SyncError::from(e);
                let products = self.cached_products();
                warn!(error = %error, cached = products.len(), "Backend fetch failed, serving cache");
                ProductListing {
                    products,
                    origin: ListingOrigin::Cache {
                        error: error.to_string(),
                    },
                }
            }
        }
    }

    /// One product, or `None` if it does not exist.
    ///
    /// Falls back to the cache when the backend cannot be reached.
    pub async fn get_product(&self, id: &str) -> Option<Product> {
        match self.read_remote(id).await {
            Ok(product) => Some(product),
            Err(SyncError::NotFound(_)) => {
                self.write_cache(|cache| cache.remove(id));
                None
            }
            Err(e) => {
                warn!(product_id = %id, error = %e, "Backend read failed, using cache");
                self.read_cache(|cache| cache.get_by_id(id))
            }
        }
    }

    /// Classifies the product's stock level. No I/O.
    pub fn get_product_stock_status(&self, product: &Product) -> StockStatus {
        product.stock_status()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Validates and inserts a new product.
    ///
    /// ## Errors
    /// - `Validation` before any network call
    /// - `DuplicateKey` from the pre-check or the backend's unique constraint
    /// - `AuthRequired` when no session can be obtained
    pub async fn add_product(&self, candidate: &NewProduct) -> SyncResult<Product> {
        let result = self.try_add_product(candidate).await;
        self.report(result)
    }

    async fn try_add_product(&self, candidate: &NewProduct) -> SyncResult<Product> {
        candidate.validate()?;
        self.ensure_authenticated().await?;

        let item_number = candidate.item_number.trim();
        let existing = self
            .with_auth_retry("fetch_by_item_number", || {
                self.gateway.fetch_by_item_number(item_number)
            })
            .await?;
        if existing.is_some() {
            return Err(SyncError::DuplicateKey {
                item_number: item_number.to_string(),
            });
        }

        let row = NewProductRow::from_candidate(candidate, self.settings.default_low_stock_threshold);
        let product = self
            .with_auth_retry("insert", || self.gateway.insert(&row))
            .await
            .map_err(|e| write_error(e, item_number))?
            .into_product()?;

        self.write_cache(|cache| cache.upsert(product.clone()));
        info!(product_id = %product.id, item_number = %product.item_number, "Product added");
        Ok(product)
    }

    /// Replaces every stored field of `product`.
    pub async fn update_product(&self, product: &Product) -> SyncResult<Product> {
        let result = self.try_update_product(product).await;
        self.report(result)
    }

    async fn try_update_product(&self, product: &Product) -> SyncResult<Product> {
        product.validate()?;
        self.ensure_authenticated().await?;

        let patch = ProductPatch::full(product, Utc::now());
        let updated = self
            .with_auth_retry("update", || self.gateway.update(&product.id, &patch))
            .await
            .map_err(|e| write_error(e, &product.item_number))?
            .into_product()?;

        self.write_cache(|cache| cache.upsert(updated.clone()));
        info!(product_id = %updated.id, "Product updated");
        Ok(updated)
    }

    /// Takes `quantity` units from stock.
    ///
    /// Emits "low stock" or "out of stock" after a successful write, and
    /// "insufficient stock" (without writing) when there are too few units.
    pub async fn decrease_stock(&self, product_id: &str, quantity: u32) -> SyncResult<Product> {
        let result = self.try_decrease_stock(product_id, quantity).await;
        if let Ok(product) = &result {
            match product.stock_status() {
                StockStatus::OutOfStock => self.notifier.notify(Notification::out_of_stock(product)),
                StockStatus::LowStock => self.notifier.notify(Notification::low_stock(product)),
                StockStatus::InStock => {}
            }
        }
        self.report(result)
    }

    async fn try_decrease_stock(&self, product_id: &str, quantity: u32) -> SyncResult<Product> {
        let mut authenticated = false;
        let attempts = self.settings.max_conflict_retries.saturating_add(1);

        for attempt in 1..=attempts {
            let current = self.read_for_update(product_id).await?;

            let plan = vivaas_core::stock::plan_decrease(&current, quantity).map_err(|e| match e {
                CoreError::InsufficientStock {
                    available,
                    requested,
                    ..
                } => SyncError::InsufficientStock {
                    name: current.name.clone(),
                    available,
                    requested,
                },
                other => other.into(),
            })?;

            if !authenticated {
                self.ensure_authenticated().await?;
                authenticated = true;
            }

            let written = self
                .with_auth_retry("compare_and_set_stock", || {
                    self.gateway
                        .compare_and_set_stock(product_id, plan.previous, plan.new_stock)
                })
                .await?;

            match written {
                Some(row) => {
                    let updated = row.into_product()?;
                    self.write_cache(|cache| cache.upsert(updated.clone()));
                    debug!(
                        product_id = %product_id,
                        previous = plan.previous,
                        new_stock = updated.stock,
                        alert = ?plan.alert(updated.low_stock_threshold).map(alert_name),
                        "Stock decreased"
                    );
                    return Ok(updated);
                }
                None => {
                    debug!(product_id = %product_id, attempt, "Stock changed concurrently, retrying");
                }
            }
        }

        warn!(product_id = %product_id, attempts, "Giving up on contended stock decrease");
        Err(SyncError::StockConflict {
            product_id: product_id.to_string(),
            attempts,
        })
    }

    /// Deletes the product remotely and purges it from the cache.
    pub async fn delete_product(&self, product_id: &str) -> SyncResult<()> {
        let result = self.try_delete_product(product_id).await;
        self.report(result)
    }

    async fn try_delete_product(&self, product_id: &str) -> SyncResult<()> {
        self.ensure_authenticated().await?;
        self.with_auth_retry("delete", || self.gateway.delete(product_id))
            .await?;
        self.write_cache(|cache| cache.remove(product_id));
        info!(product_id = %product_id, "Product deleted");
        Ok(())
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Returns true if a live session exists or a refresh produced one.
    pub async fn check_session(&self) -> bool {
        self.ensure_authenticated().await.is_ok()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> SyncResult<Session> {
        self.gateway
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| match e {
                GatewayError::SignInFailed(message) => SyncError::Backend {
                    message,
                    code: None,
                },
                other => other.into(),
            })
    }

    /// Decoded claims of the current access token, for diagnostics.
    pub async fn session_claims(&self) -> Option<TokenClaims> {
        self.gateway.get_session().await.ok().flatten()?.claims()
    }

    /// Succeeds when a non-expired session exists, refreshing once if not.
    async fn ensure_authenticated(&self) -> SyncResult<()> {
        match self.gateway.get_session().await {
            Ok(Some(session)) if !session.is_expired() => return Ok(()),
            Ok(_) => {}
            Err(e) if e.is_auth_error() => {}
            Err(e) => return Err(e.into()),
        }

        debug!("Session missing or expired, refreshing");
        match self.gateway.refresh_session().await {
            Some(_) => Ok(()),
            None => Err(SyncError::AuthRequired),
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Runs `call`; on an auth error refreshes the session and runs it once more.
    async fn with_auth_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> GatewayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        match call().await {
            Err(e) if e.is_auth_error() => {
                warn!(operation, error = %e, "Auth error, refreshing session and retrying once");
                if self.gateway.refresh_session().await.is_none() {
                    return Err(GatewayError::NotAuthenticated);
                }
                call().await
            }
            other => other,
        }
    }

    async fn read_remote(&self, id: &str) -> SyncResult<Product> {
        let product = self
            .with_auth_retry("fetch_by_id", || self.gateway.fetch_by_id(id))
            .await?
            .into_product()?;
        self.write_cache(|cache| cache.upsert(product.clone()));
        Ok(product)
    }

    /// Read-through for a write: backend first, cache when unreachable.
    async fn read_for_update(&self, id: &str) -> SyncResult<Product> {
        match self.read_remote(id).await {
            Ok(product) => Ok(product),
            Err(SyncError::NotFound(id)) => Err(SyncError::NotFound(id)),
            Err(e) => {
                warn!(product_id = %id, error = %e, "Backend read failed, using cached stock");
                self.read_cache(|cache| cache.get_by_id(id)).ok_or(e)
            }
        }
    }

    fn read_cache<R>(&self, f: impl FnOnce(&LocalProductStore) -> R) -> R {
        let guard = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write_cache<R>(&self, f: impl FnOnce(&mut LocalProductStore) -> R) -> R {
        let mut guard = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Sends the failure's notification, then hands the result back.
    fn report<T>(&self, result: SyncResult<T>) -> SyncResult<T> {
        if let Err(e) = &result {
            debug!(error = %e, "Operation failed");
            self.notifier.notify(e.notification());
        }
        result
    }
}

/// Maps rows, skipping any that cannot be represented.
fn map_rows(rows: Vec<ProductRow>) -> Vec<Product> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            match row.into_product() {
                Ok(product) => Some(product),
                Err(e) => {
                    warn!(product_id = %id, error = %e, "Skipping undecodable product row");
                    None
                }
            }
        })
        .collect()
}

/// Backend unique-constraint rejections become `DuplicateKey`.
fn write_error(err: GatewayError, item_number: &str) -> SyncError {
    if err.is_unique_violation() {
        SyncError::DuplicateKey {
            item_number: item_number.trim().to_string(),
        }
    } else {
        err.into()
    }
}

fn alert_name(alert: StockAlert) -> &'static str {
    match alert {
        StockAlert::LowStock => "low-stock",
        StockAlert::OutOfStock => "out-of-stock",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::testing::{new_product, sample_row, FakeGateway};
    use vivaas_core::{NotificationKind, ValidationError};

    fn service(gateway: FakeGateway) -> (ProductSyncService<FakeGateway>, Arc<FakeGateway>, Arc<RecordingNotifier>) {
        let gateway = Arc::new(gateway);
        let notifier = Arc::new(RecordingNotifier::default());
        let svc = ProductSyncService::with_notifier(
            gateway.clone(),
            &InventoryConfig::default(),
            notifier.clone(),
        );
        (svc, gateway, notifier)
    }

    fn kinds(notifier: &RecordingNotifier) -> Vec<NotificationKind> {
        notifier.notifications().into_iter().map(|n| n.kind).collect()
    }

    // ── list / get ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_list_products_warms_cache() {
        let gateway = FakeGateway::signed_in();
        gateway.seed(sample_row("p1", "KRT-01", 10));
        gateway.seed(sample_row("p2", "KRT-02", 2));
        let (svc, _, _) = service(gateway);

        let listing = svc.list_products().await;
        assert_eq!(listing.origin, ListingOrigin::Remote);
        assert_eq!(listing.products.len(), 2);
        assert_eq!(svc.cached_products().len(), 2);
    }

    #[tokio::test]
    async fn test_list_products_falls_back_to_cache() {
        let gateway = FakeGateway::signed_in();
        gateway.seed(sample_row("p1", "KRT-01", 10));
        let (svc, gateway, _) = service(gateway);

        svc.list_products().await;
        gateway.fail_backend("connection refused");

        let listing = svc.list_products().await;
        assert!(listing.is_from_cache());
        assert!(listing.error().unwrap().contains("connection refused"));
        assert_eq!(listing.products.len(), 1);
    }

    #[tokio::test]
    async fn test_list_products_refreshes_once_on_auth_error() {
        let gateway = FakeGateway::signed_in();
        gateway.seed(sample_row("p1", "KRT-01", 10));
        gateway.fail_auth_times(1);
        let (svc, gateway, _) = service(gateway);

        let listing = svc.list_products().await;
        assert_eq!(listing.origin, ListingOrigin::Remote);
        assert_eq!(gateway.refresh_calls(), 1);
        assert_eq!(gateway.calls("fetch_all"), 2);
    }

    #[tokio::test]
    async fn test_list_products_retries_only_once() {
        let gateway = FakeGateway::signed_in();
        gateway.fail_auth_times(5);
        let (svc, gateway, _) = service(gateway);

        let listing = svc.list_products().await;
        assert!(listing.is_from_cache());
        assert_eq!(gateway.calls("fetch_all"), 2);
        assert_eq!(gateway.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_get_product_absent_is_none() {
        let (svc, _, _) = service(FakeGateway::signed_in());
        assert!(svc.get_product("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_get_product_uses_cache_when_backend_down() {
        let gateway = FakeGateway::signed_in();
        gateway.seed(sample_row("p1", "KRT-01", 10));
        let (svc, gateway, _) = service(gateway);
        svc.list_products().await;

        gateway.fail_backend("timeout");
        assert_eq!(svc.get_product("p1").await.unwrap().stock, 10);
    }

    // ── add ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_add_product_round_trip() {
        let (svc, _, notifier) = service(FakeGateway::signed_in());
        let candidate = new_product("KRT-10", 12);

        let added = svc.add_product(&candidate).await.unwrap();
        let fetched = svc.get_product(&added.id).await.unwrap();

        assert_eq!(fetched, added);
        assert_eq!(fetched.name, candidate.name);
        assert_eq!(fetched.price_cents, candidate.price_cents);
        assert_eq!(fetched.stock, 12);
        assert_eq!(fetched.low_stock_threshold, 5);
        assert!(svc.cached_products().iter().any(|p| p.id == added.id));
        assert!(notifier.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_add_product_validation_precedes_network() {
        let (svc, gateway, notifier) = service(FakeGateway::signed_in());

        let mut nameless = new_product("KRT-11", 1);
        nameless.name = "  ".into();
        let err = svc.add_product(&nameless).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(ValidationError::Required { .. })));

        let mut free = new_product("KRT-12", 1);
        free.price_cents = 0;
        let err = svc.add_product(&free).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));

        assert_eq!(gateway.total_calls(), 0);
        assert_eq!(kinds(&notifier), vec![NotificationKind::InvalidInput; 2]);
    }

    #[tokio::test]
    async fn test_add_product_duplicate_item_number() {
        let gateway = FakeGateway::signed_in();
        gateway.seed(sample_row("p1", "KRT-01", 10));
        let (svc, gateway, notifier) = service(gateway);

        let err = svc.add_product(&new_product("KRT-01", 3)).await.unwrap_err();
        assert!(matches!(err, SyncError::DuplicateKey { ref item_number } if item_number == "KRT-01"));
        assert_eq!(gateway.row_count(), 1);
        assert_eq!(gateway.calls("insert"), 0);
        assert_eq!(kinds(&notifier), vec![NotificationKind::DuplicateItem]);
    }

    #[tokio::test]
    async fn test_add_product_backend_unique_violation() {
        let gateway = FakeGateway::signed_in();
        gateway.hide_from_item_lookup("KRT-01");
        gateway.seed(sample_row("p1", "KRT-01", 10));
        let (svc, gateway, _) = service(gateway);

        let err = svc.add_product(&new_product("KRT-01", 3)).await.unwrap_err();
        assert!(matches!(err, SyncError::DuplicateKey { .. }));
        assert_eq!(gateway.row_count(), 1);
    }

    #[tokio::test]
    async fn test_add_product_without_session_fails() {
        let (svc, gateway, notifier) = service(FakeGateway::new());

        let err = svc.add_product(&new_product("KRT-20", 3)).await.unwrap_err();
        assert!(err.is_auth_required());
        assert_eq!(gateway.row_count(), 0);
        assert!(svc.cached_products().is_empty());
        assert_eq!(kinds(&notifier), vec![NotificationKind::LoginRequired]);
    }

    // ── update ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_update_product_replaces_fields() {
        let gateway = FakeGateway::signed_in();
        gateway.seed(sample_row("p1", "KRT-01", 10));
        let (svc, _, _) = service(gateway);

        let mut product = svc.get_product("p1").await.unwrap();
        let before = product.updated_at;
        product.name = "Silk Kurta".into();
        product.color = Some("Maroon".into());

        let updated = svc.update_product(&product).await.unwrap();
        assert_eq!(updated.name, "Silk Kurta");
        assert_eq!(updated.color.as_deref(), Some("Maroon"));
        assert!(updated.updated_at >= before);
        assert_eq!(svc.get_product("p1").await.unwrap().name, "Silk Kurta");
    }

    #[tokio::test]
    async fn test_update_missing_product_is_not_found() {
        let (svc, _, _) = service(FakeGateway::signed_in());
        let product = sample_row("ghost", "GH-1", 1).into_product().unwrap();
        let err = svc.update_product(&product).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    // ── decrease_stock ──────────────────────────────────────────────

    #[tokio::test]
    async fn test_decrease_to_low_stock() {
        let gateway = FakeGateway::signed_in();
        gateway.seed(sample_row("p1", "KRT-01", 5));
        let (svc, gateway, notifier) = service(gateway);

        let updated = svc.decrease_stock("p1", 1).await.unwrap();
        assert_eq!(updated.stock, 4);
        assert_eq!(svc.get_product_stock_status(&updated), StockStatus::LowStock);
        assert_eq!(gateway.stock_of("p1"), Some(4));
        assert_eq!(kinds(&notifier), vec![NotificationKind::LowStock]);
    }

    #[tokio::test]
    async fn test_decrease_to_out_of_stock() {
        let gateway = FakeGateway::signed_in();
        gateway.seed(sample_row("p1", "KRT-01", 1));
        let (svc, _, notifier) = service(gateway);

        let updated = svc.decrease_stock("p1", 1).await.unwrap();
        assert_eq!(updated.stock, 0);
        assert_eq!(updated.stock_status(), StockStatus::OutOfStock);
        assert_eq!(kinds(&notifier), vec![NotificationKind::OutOfStock]);
    }

    #[tokio::test]
    async fn test_decrease_in_stock_is_silent() {
        let gateway = FakeGateway::signed_in();
        gateway.seed(sample_row("p1", "KRT-01", 20));
        let (svc, _, notifier) = service(gateway);

        assert_eq!(svc.decrease_stock("p1", 3).await.unwrap().stock, 17);
        assert!(notifier.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_decrease_insufficient_leaves_stock() {
        let gateway = FakeGateway::signed_in();
        gateway.seed(sample_row("p1", "KRT-01", 3));
        let (svc, gateway, notifier) = service(gateway);

        let err = svc.decrease_stock("p1", 5).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::InsufficientStock { available: 3, requested: 5, .. }
        ));
        assert_eq!(gateway.stock_of("p1"), Some(3));
        assert_eq!(gateway.calls("compare_and_set_stock"), 0);
        assert_eq!(kinds(&notifier), vec![NotificationKind::InsufficientStock]);
    }

    #[tokio::test]
    async fn test_decrease_zero_quantity_rejected() {
        let gateway = FakeGateway::signed_in();
        gateway.seed(sample_row("p1", "KRT-01", 3));
        let (svc, _, _) = service(gateway);

        let err = svc.decrease_stock("p1", 0).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[tokio::test]
    async fn test_decrease_retries_after_lost_race() {
        let gateway = FakeGateway::signed_in();
        gateway.seed(sample_row("p1", "KRT-01", 10));
        gateway.steal_stock_once("p1", 2);
        let (svc, gateway, _) = service(gateway);

        let updated = svc.decrease_stock("p1", 3).await.unwrap();
        assert_eq!(updated.stock, 5);
        assert_eq!(gateway.stock_of("p1"), Some(5));
        assert_eq!(gateway.calls("compare_and_set_stock"), 2);
    }

    #[tokio::test]
    async fn test_decrease_gives_up_after_conflicts() {
        let gateway = FakeGateway::signed_in();
        gateway.seed(sample_row("p1", "KRT-01", 100));
        gateway.steal_stock_always("p1");
        let (svc, gateway, _) = service(gateway);

        let err = svc.decrease_stock("p1", 1).await.unwrap_err();
        assert!(matches!(err, SyncError::StockConflict { attempts: 4, .. }));
        assert_eq!(gateway.calls("compare_and_set_stock"), 4);
    }

    #[tokio::test]
    async fn test_concurrent_decrements_never_lose_updates() {
        let gateway = FakeGateway::signed_in();
        gateway.seed(sample_row("p1", "KRT-01", 10));
        let (svc, gateway, _) = service(gateway);

        let a = svc.clone();
        let b = svc.clone();
        let (ra, rb) = tokio::join!(a.decrease_stock("p1", 2), b.decrease_stock("p1", 3));
        ra.unwrap();
        rb.unwrap();
        assert_eq!(gateway.stock_of("p1"), Some(5));
    }

    #[tokio::test]
    async fn test_decrease_without_session_fails() {
        let gateway = FakeGateway::new();
        gateway.seed(sample_row("p1", "KRT-01", 10));
        let (svc, gateway, _) = service(gateway);

        let err = svc.decrease_stock("p1", 1).await.unwrap_err();
        assert!(err.is_auth_required());
        assert_eq!(gateway.stock_of("p1"), Some(10));
    }

    // ── delete ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_delete_purges_cache() {
        let gateway = FakeGateway::signed_in();
        gateway.seed(sample_row("p1", "KRT-01", 10));
        let (svc, gateway, _) = service(gateway);
        svc.list_products().await;

        svc.delete_product("p1").await.unwrap();
        assert_eq!(gateway.row_count(), 0);
        assert!(svc.cached_products().is_empty());
    }

    #[tokio::test]
    async fn test_delete_backend_failure_keeps_cache() {
        let gateway = FakeGateway::signed_in();
        gateway.seed(sample_row("p1", "KRT-01", 10));
        let (svc, gateway, notifier) = service(gateway);
        svc.list_products().await;

        gateway.fail_backend("permission denied");
        let err = svc.delete_product("p1").await.unwrap_err();
        assert!(matches!(err, SyncError::Backend { .. }));
        assert_eq!(svc.cached_products().len(), 1);
        assert_eq!(kinds(&notifier), vec![NotificationKind::UnknownError]);
    }

    // ── session ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_expired_session_is_refreshed_before_write() {
        let gateway = FakeGateway::with_expired_session();
        let (svc, gateway, _) = service(gateway);

        svc.add_product(&new_product("KRT-30", 1)).await.unwrap();
        assert_eq!(gateway.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_check_session() {
        let (svc, _, _) = service(FakeGateway::new());
        assert!(!svc.check_session().await);

        let (svc, _, _) = service(FakeGateway::signed_in());
        assert!(svc.check_session().await);
    }
}
