//! # Money Module
//!
//! Provides the `Money` type for handling prices safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  The backend stores `price` as a NUMERIC column and ships it as a       │
//! │  JSON number: 1299.5                                                    │
//! │                                                                         │
//! │  Discount math on floats drifts:                                        │
//! │    1299.5 × 0.85 = 1104.5749999999998                                   │
//! │                                                                         │
//! │  OUR SOLUTION: Integer paise                                            │
//! │    Convert ONCE at the wire boundary (from_decimal / to_decimal)        │
//! │    Everything in between is i64 arithmetic                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use vivaas_core::money::Money;
//! use vivaas_core::types::DiscountRate;
//!
//! let price = Money::from_decimal(1299.50).unwrap();
//! assert_eq!(price.cents(), 129_950);
//!
//! let sale = price.apply_discount(DiscountRate::from_percentage(10.0));
//! assert_eq!(sale.cents(), 116_955);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::types::DiscountRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (paise for INR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Converts a decimal amount from the backend into minor units.
    ///
    /// Rounds to the nearest minor unit. Returns `None` for NaN or infinite
    /// values, which the backend should never send.
    pub fn from_decimal(amount: f64) -> Option<Self> {
        if !amount.is_finite() {
            return None;
        }
        let cents = (amount * 100.0).round();
        if cents.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Money(cents as i64))
    }

    /// Converts back to the decimal form the backend column expects.
    #[inline]
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (rupees) portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Applies a percentage discount and returns the discounted amount.
    ///
    /// The discount amount is rounded half-to-even so that a catalog of
    /// `.5` cases does not drift in either direction.
    ///
    /// ```rust
    /// use vivaas_core::money::Money;
    /// use vivaas_core::types::DiscountRate;
    ///
    /// let price = Money::from_cents(10_000);
    /// let discounted = price.apply_discount(DiscountRate::from_bps(1_500)); // 15%
    /// assert_eq!(discounted.cents(), 8_500);
    /// ```
    pub fn apply_discount(&self, rate: DiscountRate) -> Money {
        let numerator = self.0 as i128 * rate.bps() as i128;
        let discount = round_half_even(numerator, 10_000);
        Money(self.0 - discount as i64)
    }

    /// Multiplies a unit price by a quantity (bill line totals).
    #[inline]
    pub const fn multiply_quantity(&self, qty: u32) -> Self {
        Money(self.0 * qty as i64)
    }
}

/// Integer division rounding half to even.
fn round_half_even(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    let twice = remainder.abs() * 2;

    if twice > denominator || (twice == denominator && quotient % 2 != 0) {
        quotient + numerator.signum()
    } else {
        quotient
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display is for logs and notifications only.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}₹{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
