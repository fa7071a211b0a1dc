//! # Stock Rules
//!
//! Stock classification and decrement planning.
//!
//! ```text
//!   stock == 0                 → OutOfStock
//!   0 < stock <= threshold     → LowStock
//!   stock > threshold          → InStock
//! ```
//!
//! A decrement is planned here (pure) and written by the sync layer. The
//! plan rejects before any subtraction, so a negative level never exists.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::Product;
use crate::validation::validate_quantity;

// =============================================================================
// Stock Status
// =============================================================================

/// Stock level classification shown next to each product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// Wire/display form: `in-stock`, `low-stock`, `out-of-stock`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "in-stock",
            StockStatus::LowStock => "low-stock",
            StockStatus::OutOfStock => "out-of-stock",
        }
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a stock level against a threshold.
///
/// Total over every `(stock, threshold)` pair.
pub const fn stock_status(stock: u32, threshold: u32) -> StockStatus {
    if stock == 0 {
        StockStatus::OutOfStock
    } else if stock <= threshold {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}

// =============================================================================
// Alerts
// =============================================================================

/// Alert raised after a successful decrease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockAlert {
    LowStock,
    OutOfStock,
}

/// Returns the alert for a post-decrease stock level, if any.
///
/// Low and out-of-stock are mutually exclusive: zero only ever yields
/// `OutOfStock`.
pub const fn alert_after_decrease(new_stock: u32, threshold: u32) -> Option<StockAlert> {
    match stock_status(new_stock, threshold) {
        StockStatus::OutOfStock => Some(StockAlert::OutOfStock),
        StockStatus::LowStock => Some(StockAlert::LowStock),
        StockStatus::InStock => None,
    }
}

// =============================================================================
// Decrease Planning
// =============================================================================

/// A validated decrement, ready to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockDecrease {
    /// Level that was read. The write is conditional on it.
    pub previous: u32,
    pub new_stock: u32,
}

impl StockDecrease {
    pub const fn alert(&self, threshold: u32) -> Option<StockAlert> {
        alert_after_decrease(self.new_stock, threshold)
    }
}

/// Plans taking `quantity` units from `product`.
///
/// ## Errors
/// - `Validation` when `quantity` is zero
/// - `InsufficientStock` when `product.stock < quantity`
pub fn plan_decrease(product: &Product, quantity: u32) -> CoreResult<StockDecrease> {
    validate_quantity(quantity)?;

    let new_stock = product
        .stock
        .checked_sub(quantity)
        .ok_or_else(|| CoreError::InsufficientStock {
            item_number: product.item_number.clone(),
            available: product.stock,
            requested: quantity,
        })?;

    Ok(StockDecrease {
        previous: product.stock,
        new_stock,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
