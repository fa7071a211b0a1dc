//! # vivaas-core: Pure Inventory Logic for Vivaas
//!
//! This crate holds the product model and every stock rule as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Vivaas Inventory Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Billing / inventory screens (out of scope)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ ProductsSync / ProductSyncService      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 vivaas-sync (gateway, realtime)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ vivaas-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   stock   │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │  status   │  │   rules   │  │   │
//! │  │   │NewProduct │  │ Discount  │  │  alerts   │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO BACKEND • NO NETWORK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Product, NewProduct, DiscountRate
//! - [`money`] - Money type with integer arithmetic
//! - [`stock`] - Stock status classification and decrement planning
//! - [`notification`] - User-facing messages emitted by the sync layer
//! - [`validation`] - Input validation for product candidates
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use vivaas_core::stock::{stock_status, StockStatus};
//!
//! assert_eq!(stock_status(0, 5), StockStatus::OutOfStock);
//! assert_eq!(stock_status(5, 5), StockStatus::LowStock);
//! assert_eq!(stock_status(6, 5), StockStatus::InStock);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod notification;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use notification::{Notification, NotificationKind, Severity};
pub use stock::{StockAlert, StockStatus};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Low-stock threshold applied when a product is created without one.
pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 5;

/// Upper bound for a discount, in basis points (100%).
pub const MAX_DISCOUNT_BPS: u32 = 10_000;
