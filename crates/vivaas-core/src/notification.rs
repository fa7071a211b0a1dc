//! # Notifications
//!
//! User-facing messages produced by the sync layer. Rendering is left to the
//! UI; this module only decides kind, wording and severity.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::Product;

/// How loudly the UI should present a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Severity {
    Info,
    Warning,
    Destructive,
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum NotificationKind {
    LowStock,
    OutOfStock,
    InsufficientStock,
    ProductAdded,
    ProductRemoved,
    LoginRequired,
    DuplicateItem,
    InvalidInput,
    LoadFailed,
    UnknownError,
}

/// A message for the "show user-facing message" collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notification {
    fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            description: description.into(),
            severity,
        }
    }

    pub fn low_stock(product: &Product) -> Self {
        Self::new(
            NotificationKind::LowStock,
            "Low Stock Alert",
            format!("{} is running low ({} left).", product.name, product.stock),
            Severity::Warning,
        )
    }

    pub fn out_of_stock(product: &Product) -> Self {
        Self::new(
            NotificationKind::OutOfStock,
            "Out of Stock",
            format!("{} is now out of stock.", product.name),
            Severity::Destructive,
        )
    }

    pub fn insufficient_stock(name: &str, available: u32, requested: u32) -> Self {
        Self::new(
            NotificationKind::InsufficientStock,
            "Insufficient Stock",
            format!("Only {available} units of {name} left, {requested} requested."),
            Severity::Destructive,
        )
    }

    pub fn product_added(name: &str) -> Self {
        Self::new(
            NotificationKind::ProductAdded,
            "Product Added",
            format!("{name} has been added to the inventory."),
            Severity::Info,
        )
    }

    pub fn product_removed() -> Self {
        Self::new(
            NotificationKind::ProductRemoved,
            "Product Removed",
            "A product has been removed from the inventory.",
            Severity::Info,
        )
    }

    pub fn login_required() -> Self {
        Self::new(
            NotificationKind::LoginRequired,
            "Login Required",
            "Please log in to view and modify products.",
            Severity::Destructive,
        )
    }

    pub fn duplicate_item(item_number: &str) -> Self {
        Self::new(
            NotificationKind::DuplicateItem,
            "Duplicate Item",
            format!("A product with item number {item_number} already exists."),
            Severity::Destructive,
        )
    }

    pub fn invalid_input(reason: &str) -> Self {
        Self::new(
            NotificationKind::InvalidInput,
            "Invalid Product",
            reason.to_string(),
            Severity::Destructive,
        )
    }

    pub fn load_failed() -> Self {
        Self::new(
            NotificationKind::LoadFailed,
            "Error",
            "Failed to load products. Please try again.",
            Severity::Destructive,
        )
    }

    pub fn unknown_error(detail: &str) -> Self {
        Self::new(
            NotificationKind::UnknownError,
            "Operation Failed",
            format!("Something went wrong: {detail}"),
            Severity::Destructive,
        )
    }
}
