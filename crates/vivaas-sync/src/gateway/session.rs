//! # Session
//!
//! The authenticated session issued by the backend's auth API.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  sign_in_with_password ──► Session { access_token, refresh_token }      │
//! │                                  │                                      │
//! │                                  │  every table call                    │
//! │                                  ▼                                      │
//! │                     Authorization: Bearer <access_token>                │
//! │                                  │                                      │
//! │                 401 / PGRST301 / "JWT expired"                          │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │  refresh_session ──► new Session (or None, never an error)              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Session slot shared by the REST client and its open realtime channels.
pub type SharedSession = Arc<RwLock<Option<Session>>>;

/// Seconds before `expires_at` at which a session counts as expired.
const EXPIRY_MARGIN_SECS: i64 = 30;

/// An authenticated backend session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry, when the backend reported one.
    pub expires_at: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub email: Option<String>,
}

impl Session {
    /// Check if the session is expired or about to expire at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(EXPIRY_MARGIN_SECS) >= expires_at,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Decodes the access token's payload without verifying the signature.
    ///
    /// Diagnostics only. The backend verifies the token on every call.
    pub fn claims(&self) -> Option<TokenClaims> {
        inspect_token(&self.access_token)
    }
}

/// Fields of the access-token payload used for auth-status diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User id.
    #[serde(default)]
    pub sub: Option<String>,
    /// Expiry as seconds since the epoch.
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }
}

/// Decodes a JWT payload with signature and claim validation switched off.
pub fn inspect_token(token: &str) -> Option<TokenClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .ok()
}
