//! # Sync Error Types
//!
//! Errors surfaced to callers of the sync service.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Caller input   │  │  Business rules │  │     Backend             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Validation     │  │  DuplicateKey   │  │  AuthRequired           │ │
//! │  │                 │  │  Insufficient   │  │  Backend{message,code}  │ │
//! │  │                 │  │  StockConflict  │  │  NotFound               │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │  Configuration  │   Every variant maps to a user Notification.      │
//! │  │  InvalidConfig  │                                                   │
//! │  │  ConfigLoad/Save│                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use vivaas_core::{CoreError, Notification, ValidationError};

use crate::gateway::GatewayError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Caller Input
    // =========================================================================
    /// Bad input. Never retried.
    #[error("Invalid product: {0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Business Rules
    // =========================================================================
    /// Another product already uses this item number.
    #[error("A product with item number {item_number} already exists")]
    DuplicateKey { item_number: String },

    /// Not enough units on hand. Nothing was written.
    #[error("Insufficient stock for {name}: available {available}, requested {requested}")]
    InsufficientStock {
        name: String,
        available: u32,
        requested: u32,
    },

    /// Concurrent decrements kept winning the compare-and-set.
    #[error("Stock for product {product_id} kept changing after {attempts} attempts")]
    StockConflict { product_id: String, attempts: u32 },

    // =========================================================================
    // Backend
    // =========================================================================
    /// No session, and a refresh did not produce one.
    #[error("Not authenticated. Please log in to view and modify products.")]
    AuthRequired,

    /// Opaque transport or query failure.
    #[error("Backend error: {message}")]
    Backend {
        message: String,
        code: Option<String>,
    },

    /// The product does not exist.
    #[error("Product not found: {0}")]
    NotFound(String),

    // =========================================================================
    // Configuration
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<GatewayError> for SyncError {
    fn from(err: GatewayError) -> Self {
        if err.is_auth_error() {
            return SyncError::AuthRequired;
        }
        match err {
            GatewayError::NotFound(id) => SyncError::NotFound(id),
            e @ GatewayError::Backend { .. } if e.is_not_found() => SyncError::NotFound(e.to_string()),
            GatewayError::Backend { message, code, .. } => SyncError::Backend { message, code },
            other => SyncError::Backend {
                message: other.to_string(),
                code: None,
            },
        }
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => SyncError::NotFound(id),
            CoreError::InsufficientStock {
                item_number,
                available,
                requested,
            } => SyncError::InsufficientStock {
                name: item_number,
                available,
                requested,
            },
            CoreError::Validation(v) => SyncError::Validation(v),
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if the caller should send the user to the login screen.
    pub fn is_auth_required(&self) -> bool {
        matches!(self, SyncError::AuthRequired)
    }

    /// Returns true for business-rule conflicts (no write was made).
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            SyncError::DuplicateKey { .. }
                | SyncError::InsufficientStock { .. }
                | SyncError::StockConflict { .. }
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// The user-facing message for this failure.
    pub fn notification(&self) -> Notification {
        match self {
            SyncError::AuthRequired => Notification::login_required(),
            SyncError::InsufficientStock {
                name,
                available,
                requested,
                ..
            } => Notification::insufficient_stock(name, *available, *requested),
            SyncError::DuplicateKey { item_number } => Notification::duplicate_item(item_number),
            SyncError::Validation(v) => Notification::invalid_input(&v.to_string()),
            other => Notification::unknown_error(&other.to_string()),
        }
    }
}
