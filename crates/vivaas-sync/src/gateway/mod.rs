//! # Remote Product Gateway
//!
//! Thin typed wrapper over the backend's table, auth and realtime APIs.
//!
//! ## Responsibility
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ✅ Gateway does                        ❌ Gateway does NOT              │
//! │  ──────────────                         ──────────────────               │
//! │  • select / insert / update / delete    • validate products             │
//! │  • session get / refresh / sign-in      • retry (service decides)       │
//! │  • open realtime channels               • touch the local cache         │
//! │  • map HTTP errors to GatewayError      • emit notifications            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows come back in wire form ([`ProductRow`]). The service maps them with
//! [`ProductRow::into_product`].

pub mod error;
pub mod rest;
pub mod row;
pub mod session;

use async_trait::async_trait;

pub use error::{GatewayError, GatewayResult};
pub use rest::RestGateway;
pub use row::{NewProductRow, ProductPatch, ProductRow};
pub use session::{inspect_token, Session, SharedSession, TokenClaims};

use crate::realtime::ChangeSubscription;

/// Backend operations used by the sync service and realtime feed.
#[async_trait]
pub trait RemoteProductGateway: Send + Sync {
    // =========================================================================
    // Table
    // =========================================================================

    /// All rows.
    async fn fetch_all(&self) -> GatewayResult<Vec<ProductRow>>;

    /// One row, or `GatewayError::NotFound`.
    async fn fetch_by_id(&self, id: &str) -> GatewayResult<ProductRow>;

    /// The row with this item number, if any.
    async fn fetch_by_item_number(&self, item_number: &str) -> GatewayResult<Option<ProductRow>>;

    /// Inserts a row. A unique-constraint rejection keeps its backend code.
    async fn insert(&self, row: &NewProductRow) -> GatewayResult<ProductRow>;

    /// Updates the row with `id`, or `GatewayError::NotFound`.
    async fn update(&self, id: &str, patch: &ProductPatch) -> GatewayResult<ProductRow>;

    /// Writes `new_stock` only if the row still has `expected_stock`.
    ///
    /// `Ok(None)` means no row matched (a concurrent writer got there first,
    /// or the row is gone).
    async fn compare_and_set_stock(
        &self,
        id: &str,
        expected_stock: u32,
        new_stock: u32,
    ) -> GatewayResult<Option<ProductRow>>;

    async fn delete(&self, id: &str) -> GatewayResult<()>;

    // =========================================================================
    // Session
    // =========================================================================

    /// The current session, if any.
    async fn get_session(&self) -> GatewayResult<Option<Session>>;

    /// Exchanges the refresh token for a new session.
    ///
    /// Never fails: any problem is logged and reported as `None`.
    async fn refresh_session(&self) -> Option<Session>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> GatewayResult<Session>;

    // =========================================================================
    // Realtime
    // =========================================================================

    /// Opens a push channel for every change on `table`.
    async fn subscribe_to_table_changes(&self, table: &str) -> GatewayResult<ChangeSubscription>;
}
