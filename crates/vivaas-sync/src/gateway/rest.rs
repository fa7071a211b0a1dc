//! # REST Gateway
//!
//! [`RemoteProductGateway`] over the backend's HTTP APIs.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Table API  {url}/rest/v1/{table}                                      │
//! │    GET    ?select=*                         fetch_all                  │
//! │    GET    ?select=*&id=eq.{id}              fetch_by_id                │
//! │    GET    ?select=*&item_number=eq.{n}      fetch_by_item_number       │
//! │    POST   Prefer: return=representation     insert                     │
//! │    PATCH  ?id=eq.{id}                       update                     │
//! │    PATCH  ?id=eq.{id}&stock=eq.{expected}   compare_and_set_stock      │
//! │    DELETE ?id=eq.{id}                       delete                     │
//! │                                                                         │
//! │  Auth API   {url}/auth/v1/token                                        │
//! │    POST   ?grant_type=password              sign_in_with_password      │
//! │    POST   ?grant_type=refresh_token         refresh_session            │
//! │                                                                         │
//! │  Every request: apikey: {anon_key}                                     │
//! │                 Authorization: Bearer {access_token | anon_key}        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use super::error::{GatewayError, GatewayResult};
use super::row::{NewProductRow, ProductPatch, ProductRow};
use super::session::{Session, SharedSession};
use super::RemoteProductGateway;
use crate::config::InventoryConfig;
use crate::realtime::{ChangeSubscription, RealtimeConfig, RealtimeTransport};

const PREFER_REPRESENTATION: &str = "return=representation";

// =============================================================================
// Auth Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<AuthUser>,
}

impl AuthResponse {
    fn into_session(self) -> Session {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => Utc.timestamp_opt(at, 0).single(),
            (None, Some(secs)) => Some(Utc::now() + ChronoDuration::seconds(secs)),
            (None, None) => None,
        };
        let (user_id, email) = match self.user {
            Some(user) => (Some(user.id), user.email),
            None => (None, None),
        };
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user_id,
            email,
        }
    }
}

// =============================================================================
// REST Gateway
// =============================================================================

/// HTTP gateway to the hosted backend.
///
/// ## Usage
/// ```rust,ignore
/// let gateway = RestGateway::new(&config)?;
/// gateway.sign_in_with_password("owner@shop.in", "secret").await?;
/// let rows = gateway.fetch_all().await?;
/// ```
pub struct RestGateway {
    http: reqwest::Client,
    config: InventoryConfig,
    base_url: Url,
    /// Current session (if signed in). Realtime channels read it on every join.
    session: SharedSession,
}

impl RestGateway {
    /// Creates a gateway with no session.
    pub fn new(config: &InventoryConfig) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("vivaas-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut base_url = Url::parse(&config.backend.url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(RestGateway {
            http,
            config: config.clone(),
            base_url,
            session: Arc::new(RwLock::new(None)),
        })
    }

    /// Forgets the current session.
    pub async fn sign_out(&self) {
        *self.session.write().await = None;
        info!("Signed out");
    }

    // ── URL builders ────────────────────────────────────────────────

    fn table_url(&self, filters: &[(&str, String)]) -> GatewayResult<Url> {
        let mut url = self
            .base_url
            .join(&format!("rest/v1/{}", self.config.backend.table))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "*");
            for (column, filter) in filters {
                query.append_pair(column, filter);
            }
        }
        Ok(url)
    }

    fn auth_url(&self, grant_type: &str) -> GatewayResult<Url> {
        let mut url = self.base_url.join("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        Ok(url)
    }

    // ── Request helpers ─────────────────────────────────────────────

    async fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = match self.session.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => self.config.backend.anon_key.clone(),
        };
        self.http
            .request(method, url)
            .header("apikey", &self.config.backend.anon_key)
            .bearer_auth(bearer)
    }

    async fn send_rows(&self, request: RequestBuilder) -> GatewayResult<Vec<ProductRow>> {
        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(backend_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| GatewayError::Decode {
            message: e.to_string(),
            body,
        })
    }

    async fn send_auth(&self, url: Url, body: &impl Serialize) -> GatewayResult<Session> {
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.config.backend.anon_key)
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(match backend_error(status, &text) {
                GatewayError::Backend { message, .. }
                    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED =>
                {
                    GatewayError::SignInFailed(message)
                }
                other => other,
            });
        }

        let auth: AuthResponse = serde_json::from_str(&text).map_err(|e| GatewayError::Decode {
            message: e.to_string(),
            body: text,
        })?;
        Ok(auth.into_session())
    }

    fn first_row(rows: Vec<ProductRow>, what: &str) -> GatewayResult<ProductRow> {
        rows.into_iter()
            .next()
            .ok_or_else(|| GatewayError::NotFound(what.to_string()))
    }
}

/// Builds a `GatewayError::Backend` from an error response body.
///
/// The table API sends `{ message, code, details, hint }`; the auth API
/// sends `{ msg | error_description | error, error_code }`.
fn backend_error(status: StatusCode, body: &str) -> GatewayError {
    let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

    let message = text("message")
        .or_else(|| text("msg"))
        .or_else(|| text("error_description"))
        .or_else(|| text("error"))
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.to_string()
            }
        });
    let code = text("code").or_else(|| text("error_code"));

    GatewayError::Backend {
        message,
        code,
        status: status.as_u16(),
    }
}

#[async_trait]
impl RemoteProductGateway for RestGateway {
    async fn fetch_all(&self) -> GatewayResult<Vec<ProductRow>> {
        let url = self.table_url(&[])?;
        debug!(%url, "GET products");
        let rows = self.send_rows(self.request(Method::GET, url).await).await?;
        debug!(count = rows.len(), "Fetched products");
        Ok(rows)
    }

    async fn fetch_by_id(&self, id: &str) -> GatewayResult<ProductRow> {
        let url = self.table_url(&[("id", format!("eq.{id}"))])?;
        debug!(product_id = %id, "GET product");
        let rows = self.send_rows(self.request(Method::GET, url).await).await?;
        Self::first_row(rows, id)
    }

    async fn fetch_by_item_number(&self, item_number: &str) -> GatewayResult<Option<ProductRow>> {
        let url = self.table_url(&[
            ("item_number", format!("eq.{item_number}")),
            ("limit", "1".to_string()),
        ])?;
        debug!(item_number = %item_number, "GET product by item number");
        let rows = self.send_rows(self.request(Method::GET, url).await).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, row: &NewProductRow) -> GatewayResult<ProductRow> {
        let url = self.table_url(&[])?;
        debug!(item_number = %row.item_number, "POST product");
        let request = self
            .request(Method::POST, url)
            .await
            .header("Prefer", PREFER_REPRESENTATION)
            .json(row);
        let rows = self.send_rows(request).await?;
        rows.into_iter().next().ok_or_else(|| GatewayError::Decode {
            message: "insert returned no row".to_string(),
            body: String::new(),
        })
    }

    async fn update(&self, id: &str, patch: &ProductPatch) -> GatewayResult<ProductRow> {
        let url = self.table_url(&[("id", format!("eq.{id}"))])?;
        debug!(product_id = %id, "PATCH product");
        let request = self
            .request(Method::PATCH, url)
            .await
            .header("Prefer", PREFER_REPRESENTATION)
            .json(patch);
        let rows = self.send_rows(request).await?;
        Self::first_row(rows, id)
    }

    async fn compare_and_set_stock(
        &self,
        id: &str,
        expected_stock: u32,
        new_stock: u32,
    ) -> GatewayResult<Option<ProductRow>> {
        let url = self.table_url(&[
            ("id", format!("eq.{id}")),
            ("stock", format!("eq.{expected_stock}")),
        ])?;
        debug!(product_id = %id, expected_stock, new_stock, "PATCH product stock");
        let request = self
            .request(Method::PATCH, url)
            .await
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&ProductPatch::stock(new_stock, Utc::now()));
        let rows = self.send_rows(request).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, id: &str) -> GatewayResult<()> {
        let mut url = self.base_url.join(&format!("rest/v1/{}", self.config.backend.table))?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
        debug!(product_id = %id, "DELETE product");

        let resp = self.request(Method::DELETE, url).await.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await?;
            return Err(backend_error(status, &body));
        }
        Ok(())
    }

    async fn get_session(&self) -> GatewayResult<Option<Session>> {
        Ok(self.session.read().await.clone())
    }

    async fn refresh_session(&self) -> Option<Session> {
        let refresh_token = {
            let guard = self.session.read().await;
            guard.as_ref().map(|s| s.refresh_token.clone())
        }?;

        let url = match self.auth_url("refresh_token") {
            Ok(url) => url,
            Err(e) => {
                warn!(?e, "Cannot build refresh URL");
                return None;
            }
        };

        match self
            .send_auth(
                url,
                &RefreshGrant {
                    refresh_token: &refresh_token,
                },
            )
            .await
        {
            Ok(session) => {
                info!(user_id = ?session.user_id, "Session refreshed");
                *self.session.write().await = Some(session.clone());
                Some(session)
            }
            Err(GatewayError::SignInFailed(message)) => {
                warn!(%message, "Refresh token rejected, clearing session");
                *self.session.write().await = None;
                None
            }
            Err(e) => {
                warn!(?e, "Session refresh failed");
                None
            }
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> GatewayResult<Session> {
        let url = self.auth_url("password")?;
        debug!(%email, "Signing in with password");
        let session = self.send_auth(url, &PasswordGrant { email, password }).await?;
        info!(user_id = ?session.user_id, "Signed in");
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    async fn subscribe_to_table_changes(&self, table: &str) -> GatewayResult<ChangeSubscription> {
        let mut realtime = RealtimeConfig::from_config(&self.config, Arc::clone(&self.session))?;
        realtime.table = table.to_string();
        debug!(table = %table, host = ?realtime.url.host_str(), "Opening realtime channel");
        Ok(RealtimeTransport::spawn(realtime))
    }
}
