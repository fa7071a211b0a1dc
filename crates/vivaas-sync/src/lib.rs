//! # vivaas-sync: Product Sync for Vivaas Inventory
//!
//! Keeps the product catalog consistent with the hosted backend: remote-first
//! reads with a local fallback cache, auth-gated writes with one
//! refresh-and-retry, stock decrements with low/out-of-stock alerts, and a
//! realtime feed that keeps the screens current.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Product Sync Architecture                        │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 ProductsSync (view adapter)                      │  │
//! │  │                                                                  │  │
//! │  │  watch::Sender<ProductsState>  products / isLoading / error /    │  │
//! │  │                                isAuthenticated                   │  │
//! │  └───────────────┬───────────────────────────────┬──────────────────┘  │
//! │                  │ initial load, mutations       │ merge changes       │
//! │                  ▼                               ▼                      │
//! │  ┌────────────────────────────┐  ┌────────────────────────────────┐    │
//! │  │    ProductSyncService      │  │        RealtimeFeed            │    │
//! │  │                            │  │                                │    │
//! │  │ Cache fallback (reads)     │  │ Subscribes only when signed in │    │
//! │  │ Strict writes              │  │ INSERT/UPDATE/DELETE merge     │    │
//! │  │ Auth refresh + one retry   │  │ Added/Removed notifications    │    │
//! │  │ Compare-and-set stock      │  │                                │    │
//! │  └──────┬──────────────┬──────┘  └───────────────┬────────────────┘    │
//! │         │              │                         │                      │
//! │         ▼              ▼                         ▼                      │
//! │  ┌─────────────┐ ┌───────────────────────────────────────────────┐     │
//! │  │ LocalProduct│ │        RemoteProductGateway (trait)           │     │
//! │  │ Store       │ │                                               │     │
//! │  │ (cache)     │ │  RestGateway: table + auth over HTTP          │     │
//! │  └─────────────┘ │  RealtimeTransport: Phoenix channel over WS   │     │
//! │                  └───────────────────────────────────────────────┘     │
//! │                                                                         │
//! │  NOTIFICATIONS (to the UI via Notifier):                               │
//! │  • low stock / out of stock / insufficient stock                       │
//! │  • product added / product removed                                     │
//! │  • login required / duplicate item / invalid input / load failed       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Backend, realtime, stock and dev settings (TOML + env)
//! - [`error`] - Sync error types and their user notifications
//! - [`gateway`] - Backend access (REST table, auth, realtime channels)
//! - [`realtime`] - Phoenix channel transport and the incremental feed
//! - [`service`] - `ProductSyncService` orchestration
//! - [`hook`] - `ProductsSync` view state
//! - [`notify`] - Notification sink
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vivaas_sync::{InventoryConfig, ProductSyncService, ProductsSync, RestGateway};
//!
//! let config = InventoryConfig::load_or_default(None);
//! let gateway = Arc::new(RestGateway::new(&config)?);
//! let service = ProductSyncService::new(gateway, &config);
//!
//! let mut sync = ProductsSync::new(service, &config);
//! sync.start().await;
//!
//! let updated = sync.service().decrease_stock(&product_id, 1).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod gateway;
pub mod hook;
pub mod notify;
pub mod realtime;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::InventoryConfig;
pub use error::{SyncError, SyncResult};
pub use gateway::{GatewayError, RemoteProductGateway, RestGateway, Session};
pub use hook::{AuthState, ProductsState, ProductsSync};
pub use notify::{NoOpNotifier, Notifier, TracingNotifier};
pub use realtime::{ProductChange, RealtimeFeed};
pub use service::{ListingOrigin, ProductListing, ProductSyncService};
