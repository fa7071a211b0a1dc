//! # Domain Types
//!
//! Core domain types used throughout Vivaas inventory.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │   NewProduct    │   │  DiscountRate   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (server)    │   │  no id          │   │  bps (u32)      │       │
//! │  │  item_number    │   │  no timestamps  │   │  1500 = 15%     │       │
//! │  │  price_cents    │   │  validated      │   └─────────────────┘       │
//! │  │  stock          │   │  before insert  │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! - `id`: assigned by the backend, used by bill line items
//! - `item_number`: human-readable business key, unique across the catalog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::stock::{stock_status, StockStatus};
use crate::validation::{
    validate_discount_bps, validate_item_number, validate_price_cents, validate_required,
    ValidationResult,
};
use crate::MAX_DISCOUNT_BPS;

// =============================================================================
// Discount Rate
// =============================================================================

/// Discount represented in basis points (1 bps = 0.01%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    /// Creates a discount from basis points, capped at 100%.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        if bps > MAX_DISCOUNT_BPS {
            DiscountRate(MAX_DISCOUNT_BPS)
        } else {
            DiscountRate(bps)
        }
    }

    /// Creates a discount from a percentage as stored by the backend.
    ///
    /// Negative and non-finite inputs clamp to zero.
    pub fn from_percentage(pct: f64) -> Self {
        if !pct.is_finite() || pct <= 0.0 {
            return DiscountRate(0);
        }
        DiscountRate::from_bps((pct * 100.0).round().min(MAX_DISCOUNT_BPS as f64) as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (wire format and display).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero discount.
    #[inline]
    pub const fn zero() -> Self {
        DiscountRate(0)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A sellable catalog item.
///
/// `stock` and `low_stock_threshold` are unsigned: a negative stock level is
/// unrepresentable, so the decrease path must reject before subtracting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    /// Backend-assigned identifier.
    pub id: String,

    /// Display name shown on bills.
    pub name: String,

    pub brand: String,

    pub category: String,

    /// Business key, unique across the catalog.
    pub item_number: String,

    /// Price in minor units.
    pub price_cents: i64,

    /// Discount in basis points (0-10000).
    pub discount_bps: u32,

    /// Units on hand.
    pub stock: u32,

    /// At or below this level (and above zero) the product is low on stock.
    pub low_stock_threshold: u32,

    /// Image reference (URL or storage path).
    pub image: String,

    pub description: String,

    pub size: Option<String>,

    pub color: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the list price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the discount rate.
    #[inline]
    pub fn discount(&self) -> DiscountRate {
        DiscountRate::from_bps(self.discount_bps)
    }

    /// Price after the product's own discount, used by bill line items.
    pub fn discounted_price(&self) -> Money {
        self.price().apply_discount(self.discount())
    }

    /// Classifies the current stock level.
    #[inline]
    pub fn stock_status(&self) -> StockStatus {
        stock_status(self.stock, self.low_stock_threshold)
    }

    /// Validates the fields that every stored product must satisfy.
    ///
    /// Used before a full-record update, where the caller may have edited
    /// any field.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("name", &self.name)?;
        validate_required("brand", &self.brand)?;
        validate_required("category", &self.category)?;
        validate_item_number(&self.item_number)?;
        validate_price_cents(self.price_cents)?;
        validate_discount_bps(self.discount_bps)?;
        Ok(())
    }
}

// =============================================================================
// New Product
// =============================================================================

/// A product candidate that has not been stored yet.
///
/// The backend assigns `id`, `created_at` and `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    pub brand: String,
    pub category: String,
    pub item_number: String,
    pub price_cents: i64,
    #[serde(default)]
    pub discount_bps: u32,
    #[serde(default)]
    pub stock: u32,
    /// Falls back to the configured default threshold when absent.
    #[serde(default)]
    pub low_stock_threshold: Option<u32>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl NewProduct {
    /// Validates required fields, price and discount.
    ///
    /// Runs before any network call.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("name", &self.name)?;
        validate_required("brand", &self.brand)?;
        validate_required("category", &self.category)?;
        validate_item_number(&self.item_number)?;
        validate_price_cents(self.price_cents)?;
        validate_discount_bps(self.discount_bps)?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
