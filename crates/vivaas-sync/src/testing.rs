//! In-memory [`RemoteProductGateway`] for unit tests.
//!
//! Models the products table with its unique `item_number` constraint, a
//! session that can be refreshed, and realtime channels fed by
//! [`FakeGateway::push_change`]. Failures are injected per test.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};
use vivaas_core::NewProduct;

use crate::gateway::error::CODE_UNIQUE_VIOLATION;
use crate::gateway::{
    GatewayError, GatewayResult, NewProductRow, ProductPatch, ProductRow, RemoteProductGateway,
    Session,
};
use crate::realtime::protocol::table_topic;
use crate::realtime::{ChangeEvent, ChangeSubscription};

pub const FIXED_TIMESTAMP: &str = "2024-04-01T10:00:00+00:00";

/// A stored row with a fixed timestamp and a threshold of 5.
pub fn sample_row(id: &str, item_number: &str, stock: i64) -> ProductRow {
    ProductRow {
        id: id.to_string(),
        name: format!("Kurta {item_number}"),
        brand: Some("Vivaas".to_string()),
        category: Some("Kurtas".to_string()),
        item_number: item_number.to_string(),
        price: 1299.0,
        discount_percentage: Some(10.0),
        stock,
        low_stock_threshold: Some(5),
        image: Some(format!("/images/{item_number}.jpg")),
        description: Some("Cotton kurta".to_string()),
        size: Some("M".to_string()),
        color: None,
        created_at: Some(FIXED_TIMESTAMP.to_string()),
        updated_at: Some(FIXED_TIMESTAMP.to_string()),
    }
}

/// A valid candidate with no explicit threshold.
pub fn new_product(item_number: &str, stock: u32) -> NewProduct {
    NewProduct {
        name: format!("Kurta {item_number}"),
        brand: "Vivaas".to_string(),
        category: "Kurtas".to_string(),
        item_number: item_number.to_string(),
        price_cents: 129_900,
        discount_bps: 1_000,
        stock,
        low_stock_threshold: None,
        image: String::new(),
        description: "Cotton kurta".to_string(),
        size: Some("M".to_string()),
        color: None,
    }
}

fn fresh_session(n: usize) -> Session {
    Session {
        access_token: format!("fake-access-{n}"),
        refresh_token: format!("fake-refresh-{n}"),
        expires_at: Some(Utc::now() + Duration::hours(1)),
        user_id: Some("user-1".to_string()),
        email: Some("owner@vivaas.test".to_string()),
    }
}

enum Steal {
    Once(u32),
    Always,
}

struct Channel {
    events: mpsc::Sender<ChangeEvent>,
    shutdown: oneshot::Receiver<()>,
}

#[derive(Default)]
struct State {
    rows: Vec<ProductRow>,
    session: Option<Session>,
    credentials: Option<(String, String)>,
    auth_failures: usize,
    backend_failure: Option<String>,
    hidden_items: HashSet<String>,
    steals: HashMap<String, Steal>,
    calls: HashMap<&'static str, usize>,
    refreshes: usize,
    channels: Vec<Channel>,
    change_during_fetch: Option<ChangeEvent>,
}

#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<State>,
}

impl FakeGateway {
    /// No session.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in() -> Self {
        let gateway = Self::new();
        gateway.state.lock().unwrap().session = Some(fresh_session(0));
        gateway
    }

    /// A session whose refresh token still works.
    pub fn with_expired_session() -> Self {
        let gateway = Self::new();
        let mut session = fresh_session(0);
        session.expires_at = Some(Utc::now() - Duration::minutes(5));
        gateway.state.lock().unwrap().session = Some(session);
        gateway
    }

    // ── setup ───────────────────────────────────────────────────────

    pub fn seed(&self, row: ProductRow) {
        self.state.lock().unwrap().rows.push(row);
    }

    pub fn accept_credentials(&self, email: &str, password: &str) {
        self.state.lock().unwrap().credentials = Some((email.to_string(), password.to_string()));
    }

    pub fn clear_session(&self) {
        self.state.lock().unwrap().session = None;
    }

    /// The next `n` table calls fail with an expired-JWT error.
    pub fn fail_auth_times(&self, n: usize) {
        self.state.lock().unwrap().auth_failures = n;
    }

    /// Every table call fails until [`recover`](Self::recover).
    pub fn fail_backend(&self, message: &str) {
        self.state.lock().unwrap().backend_failure = Some(message.to_string());
    }

    pub fn recover(&self) {
        self.state.lock().unwrap().backend_failure = None;
    }

    /// `fetch_by_item_number` misses this item, as if a concurrent
    /// creator inserted it after the pre-check.
    pub fn hide_from_item_lookup(&self, item_number: &str) {
        self.state
            .lock()
            .unwrap()
            .hidden_items
            .insert(item_number.to_string());
    }

    /// The next compare-and-set on `id` loses to a concurrent decrement.
    pub fn steal_stock_once(&self, id: &str, units: u32) {
        self.state
            .lock()
            .unwrap()
            .steals
            .insert(id.to_string(), Steal::Once(units));
    }

    /// Every compare-and-set on `id` loses to a concurrent decrement.
    pub fn steal_stock_always(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .steals
            .insert(id.to_string(), Steal::Always);
    }

    /// Delivers `event` to every open channel.
    pub fn push_change(&self, event: ChangeEvent) {
        let state = self.state.lock().unwrap();
        for channel in &state.channels {
            let _ = channel.events.try_send(event.clone());
        }
    }

    /// Delivers `event` while the next `fetch_all` is in flight, after the
    /// rows it returns were read.
    pub fn push_change_during_fetch(&self, event: ChangeEvent) {
        self.state.lock().unwrap().change_during_fetch = Some(event);
    }

    // ── inspection ──────────────────────────────────────────────────

    pub fn row_count(&self) -> usize {
        self.state.lock().unwrap().rows.len()
    }

    pub fn stock_of(&self, id: &str) -> Option<i64> {
        let state = self.state.lock().unwrap();
        state.rows.iter().find(|r| r.id == id).map(|r| r.stock)
    }

    pub fn calls(&self, operation: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.get(operation).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.lock().unwrap().refreshes
    }

    /// Channels whose subscription handle has not been released.
    pub fn active_channels(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        state.channels.retain_mut(|c| {
            matches!(
                c.shutdown.try_recv(),
                Err(oneshot::error::TryRecvError::Empty)
            )
        });
        state.channels.len()
    }

    // ── internals ───────────────────────────────────────────────────

    /// Counts the call and applies injected failures.
    fn enter(&self, operation: &'static str) -> GatewayResult<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(operation).or_default() += 1;

        if state.auth_failures > 0 {
            state.auth_failures -= 1;
            return Err(GatewayError::Backend {
                message: "JWT expired".to_string(),
                code: Some("PGRST303".to_string()),
                status: 401,
            });
        }
        if let Some(message) = &state.backend_failure {
            return Err(GatewayError::Backend {
                message: message.clone(),
                code: None,
                status: 503,
            });
        }
        Ok(state)
    }
}

fn unique_violation(item_number: &str) -> GatewayError {
    GatewayError::Backend {
        message: format!(
            "duplicate key value violates unique constraint \"products_item_number_key\" ({item_number})"
        ),
        code: Some(CODE_UNIQUE_VIOLATION.to_string()),
        status: 409,
    }
}

fn apply_patch(row: &mut ProductRow, patch: &ProductPatch) {
    if let Some(v) = &patch.name {
        row.name = v.clone();
    }
    if let Some(v) = patch.price {
        row.price = v;
    }
    if let Some(v) = patch.stock {
        row.stock = i64::from(v);
    }
    if let Some(v) = &patch.brand {
        row.brand = Some(v.clone());
    }
    if let Some(v) = &patch.category {
        row.category = Some(v.clone());
    }
    if let Some(v) = &patch.item_number {
        row.item_number = v.clone();
    }
    if let Some(v) = patch.discount_percentage {
        row.discount_percentage = Some(v);
    }
    if let Some(v) = patch.low_stock_threshold {
        row.low_stock_threshold = Some(i64::from(v));
    }
    if let Some(v) = &patch.image {
        row.image = Some(v.clone());
    }
    if let Some(v) = &patch.description {
        row.description = Some(v.clone());
    }
    if let Some(v) = &patch.size {
        row.size = v.clone();
    }
    if let Some(v) = &patch.color {
        row.color = v.clone();
    }
    row.updated_at = Some(patch.updated_at.clone());
}

#[async_trait]
impl RemoteProductGateway for FakeGateway {
    async fn fetch_all(&self) -> GatewayResult<Vec<ProductRow>> {
        let (rows, change) = {
            let mut state = self.enter("fetch_all")?;
            (state.rows.clone(), state.change_during_fetch.take())
        };
        if let Some(event) = change {
            self.push_change(event);
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
        }
        Ok(rows)
    }

    async fn fetch_by_id(&self, id: &str) -> GatewayResult<ProductRow> {
        let state = self.enter("fetch_by_id")?;
        state
            .rows
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    async fn fetch_by_item_number(&self, item_number: &str) -> GatewayResult<Option<ProductRow>> {
        let state = self.enter("fetch_by_item_number")?;
        if state.hidden_items.contains(item_number) {
            return Ok(None);
        }
        Ok(state.rows.iter().find(|r| r.item_number == item_number).cloned())
    }

    async fn insert(&self, row: &NewProductRow) -> GatewayResult<ProductRow> {
        let mut state = self.enter("insert")?;
        if state.rows.iter().any(|r| r.item_number == row.item_number) {
            return Err(unique_violation(&row.item_number));
        }

        let now = Utc::now().to_rfc3339();
        let stored = ProductRow {
            id: uuid::Uuid::new_v4().to_string(),
            name: row.name.clone(),
            brand: Some(row.brand.clone()),
            category: Some(row.category.clone()),
            item_number: row.item_number.clone(),
            price: row.price,
            discount_percentage: Some(row.discount_percentage),
            stock: i64::from(row.stock),
            low_stock_threshold: Some(i64::from(row.low_stock_threshold)),
            image: Some(row.image.clone()),
            description: Some(row.description.clone()),
            size: row.size.clone(),
            color: row.color.clone(),
            created_at: Some(now.clone()),
            updated_at: Some(now),
        };
        state.rows.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: &str, patch: &ProductPatch) -> GatewayResult<ProductRow> {
        let mut state = self.enter("update")?;
        if let Some(item_number) = &patch.item_number {
            if state
                .rows
                .iter()
                .any(|r| r.id != id && &r.item_number == item_number)
            {
                return Err(unique_violation(item_number));
            }
        }
        let row = state
            .rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        apply_patch(row, patch);
        Ok(row.clone())
    }

    async fn compare_and_set_stock(
        &self,
        id: &str,
        expected_stock: u32,
        new_stock: u32,
    ) -> GatewayResult<Option<ProductRow>> {
        let mut state = self.enter("compare_and_set_stock")?;

        let stolen = match state.steals.get(id) {
            Some(Steal::Once(units)) => Some(*units),
            Some(Steal::Always) => Some(1),
            None => None,
        };
        if matches!(state.steals.get(id), Some(Steal::Once(_))) {
            state.steals.remove(id);
        }

        let Some(row) = state.rows.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if let Some(units) = stolen {
            row.stock -= i64::from(units);
        }
        if row.stock != i64::from(expected_stock) {
            return Ok(None);
        }
        apply_patch(row, &ProductPatch::stock(new_stock, Utc::now()));
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: &str) -> GatewayResult<()> {
        let mut state = self.enter("delete")?;
        state.rows.retain(|r| r.id != id);
        Ok(())
    }

    async fn get_session(&self) -> GatewayResult<Option<Session>> {
        Ok(self.state.lock().unwrap().session.clone())
    }

    async fn refresh_session(&self) -> Option<Session> {
        let mut state = self.state.lock().unwrap();
        state.refreshes += 1;
        if state.session.is_none() {
            return None;
        }
        let session = fresh_session(state.refreshes);
        state.session = Some(session.clone());
        Some(session)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> GatewayResult<Session> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry("sign_in_with_password").or_default() += 1;
        match &state.credentials {
            Some((e, p)) if e == email && p == password => {
                let session = fresh_session(100);
                state.session = Some(session.clone());
                Ok(session)
            }
            _ => Err(GatewayError::SignInFailed(
                "Invalid login credentials".to_string(),
            )),
        }
    }

    async fn subscribe_to_table_changes(&self, table: &str) -> GatewayResult<ChangeSubscription> {
        let (events_tx, events_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.state.lock().unwrap().channels.push(Channel {
            events: events_tx,
            shutdown: shutdown_rx,
        });
        Ok(ChangeSubscription::new(
            table_topic(table),
            events_rx,
            shutdown_tx,
            None,
        ))
    }
}
