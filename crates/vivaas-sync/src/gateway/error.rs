//! # Gateway Errors
//!
//! Failures of the backend table, auth and realtime endpoints.
//!
//! The gateway applies no business rules, so these errors only describe
//! what the backend or the network said. [`ProductSyncService`] turns them
//! into the caller-facing taxonomy.
//!
//! [`ProductSyncService`]: crate::service::ProductSyncService

use thiserror::Error;

/// Result type alias for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Table API code for an expired or malformed JWT.
pub const CODE_JWT_INVALID: &str = "PGRST301";
/// Table API code for an expired JWT (newer servers).
pub const CODE_JWT_EXPIRED: &str = "PGRST303";
/// Table API code for "single row requested, zero returned".
pub const CODE_NO_ROWS: &str = "PGRST116";
/// Postgres `unique_violation`.
pub const CODE_UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum GatewayError {
    // ── Backend ─────────────────────────────────────────────────────
    /// Structured error returned by the backend.
    #[error("Backend error (HTTP {status}): {message}")]
    Backend {
        message: String,
        code: Option<String>,
        status: u16,
    },

    /// The requested row does not exist.
    #[error("Row not found: {0}")]
    NotFound(String),

    // ── Authentication ──────────────────────────────────────────────
    /// No session, or the backend rejected it.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Sign-in was refused (wrong credentials, unconfirmed account).
    #[error("Sign-in failed: {0}")]
    SignInFailed(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Invalid backend URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Data ────────────────────────────────────────────────────────
    /// Response body did not match the expected shape.
    #[error("Deserialization error: {message}")]
    Decode { message: String, body: String },

    // ── Realtime ────────────────────────────────────────────────────
    /// Realtime channel could not be opened or joined.
    #[error("Realtime error: {0}")]
    Realtime(String),
}

impl GatewayError {
    /// Returns `true` if refreshing the session might resolve this error.
    ///
    /// Matches 401s, the JWT error codes, and any backend message that
    /// mentions the JWT.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::NotAuthenticated => true,
            Self::Backend {
                message,
                code,
                status,
            } => {
                *status == 401
                    || matches!(code.as_deref(), Some(CODE_JWT_INVALID | CODE_JWT_EXPIRED))
                    || message.contains("JWT")
            }
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::UNAUTHORIZED),
            _ => false,
        }
    }

    /// Returns `true` if the backend's unique constraint rejected a write.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self.code(), Some(CODE_UNIQUE_VIOLATION))
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Backend { code, status, .. } => {
                *status == 404 || code.as_deref() == Some(CODE_NO_ROWS)
            }
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }

    /// Extract the backend error code, if available.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Backend { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
