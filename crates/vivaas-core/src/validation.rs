//! # Validation Module
//!
//! Input validation for product candidates and stock operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Inventory screen (out of scope)                              │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: ProductSyncService                                           │
//! │  └── THIS MODULE: runs before any network call                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Backend table                                                │
//! │  ├── NOT NULL constraints                                              │
//! │  └── UNIQUE (item_number)                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::MAX_DISCOUNT_BPS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest item number the catalog accepts.
pub const MAX_ITEM_NUMBER_LEN: usize = 50;

// =============================================================================
// String Validators
// =============================================================================

/// Rejects empty or whitespace-only values.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates an item number (business key).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - No whitespace inside the key
///
/// ```rust
/// use vivaas_core::validation::validate_item_number;
///
/// assert!(validate_item_number("KRT-001").is_ok());
/// assert!(validate_item_number("").is_err());
/// assert!(validate_item_number("KRT 001").is_err());
/// ```
pub fn validate_item_number(item_number: &str) -> ValidationResult<()> {
    validate_required("item number", item_number)?;
    let item_number = item_number.trim();

    if item_number.len() > MAX_ITEM_NUMBER_LEN {
        return Err(ValidationError::TooLong {
            field: "item number".to_string(),
            max: MAX_ITEM_NUMBER_LEN,
        });
    }

    if item_number.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "item number".to_string(),
            reason: "must not contain spaces".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a price in minor units. Free items are not allowed.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "price".to_string(),
        });
    }
    Ok(())
}

/// Validates a discount in basis points (0% to 100%).
pub fn validate_discount_bps(bps: u32) -> ValidationResult<()> {
    if bps > MAX_DISCOUNT_BPS {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: 100,
        });
    }
    Ok(())
}

/// Validates a stock decrease quantity.
pub fn validate_quantity(qty: u32) -> ValidationResult<()> {
    if qty == 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a product identifier before it is put into a query filter.
pub fn validate_product_id(id: &str) -> ValidationResult<()> {
    validate_required("id", id)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_required() {
        assert!(validate_required("name", "Kurta").is_ok());
        assert!(validate_required("name", "").is_err());
        assert!(validate_required("name", "   ").is_err());
    }

    #[test]
    fn test_validate_item_number() {
        assert!(validate_item_number("KRT-001").is_ok());
        assert!(validate_item_number("  KRT-001 ").is_ok());
        assert!(validate_item_number("").is_err());
        assert!(validate_item_number("KRT 001").is_err());
        assert!(validate_item_number(&"A".repeat(60)).is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents(1).is_ok());
        assert!(validate_price_cents(0).is_err());
        assert!(validate_price_cents(-100).is_err());
    }

    #[test]
    fn test_validate_discount_bps() {
        assert!(validate_discount_bps(0).is_ok());
        assert!(validate_discount_bps(10_000).is_ok());
        assert!(validate_discount_bps(10_001).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
    }
}
