//! # Realtime Transport
//!
//! WebSocket client for one table channel, with heartbeats and automatic
//! reconnection.
//!
//! ## Channel Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Realtime Channel States                            │
//! │                                                                         │
//! │  ┌────────────┐  connect()  ┌────────────┐  phx_join  ┌────────────┐   │
//! │  │Disconnected│ ──────────► │ Connecting │ ─────────► │   Joined   │   │
//! │  └────────────┘             └─────┬──────┘            └─────┬──────┘   │
//! │        ▲                          │ failure                 │          │
//! │        │                          ▼                         │ error    │
//! │        │                    ┌────────────┐                  │          │
//! │        │                    │  Backoff   │ ◄────────────────┘          │
//! │        │                    └─────┬──────┘                             │
//! │        │     max_retries          │ timer expired → reconnect          │
//! │        └──────────────────────────┘                                    │
//! │                                                                         │
//! │  shutdown (unsubscribe / drop) from any state:                         │
//! │    phx_leave → close frame → task ends → event stream closes           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use futures_util::{Sink, SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use super::channel::{ChangeEvent, ChangeSubscription};
use super::protocol::{self, PhoenixMessage, PROTOCOL_VSN};
use crate::config::InventoryConfig;
use crate::gateway::{GatewayError, GatewayResult, SharedSession};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Transport Configuration
// =============================================================================

/// Settings for one realtime channel.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// `ws(s)://<host>/realtime/v1/websocket?apikey=...&vsn=1.0.0`
    pub url: Url,

    /// Table to watch.
    pub table: String,

    /// Session read at every join, so a reconnect carries the latest token.
    pub session: SharedSession,

    pub heartbeat_interval: Duration,

    pub connect_timeout: Duration,

    pub initial_backoff: Duration,

    pub max_backoff: Duration,

    /// Maximum reconnection attempts (0 = infinite).
    pub max_retries: u32,
}

impl RealtimeConfig {
    /// Builds channel settings from the inventory config.
    pub fn from_config(config: &InventoryConfig, session: SharedSession) -> GatewayResult<Self> {
        Ok(RealtimeConfig {
            url: realtime_url(&config.backend.url, &config.backend.anon_key)?,
            table: config.backend.table.clone(),
            session,
            heartbeat_interval: config.heartbeat_interval(),
            connect_timeout: config.connect_timeout(),
            initial_backoff: Duration::from_millis(config.realtime.initial_backoff_ms),
            max_backoff: Duration::from_secs(config.realtime.max_backoff_secs),
            max_retries: config.realtime.max_retries,
        })
    }
}

/// Derives the realtime WebSocket endpoint from the backend URL.
pub fn realtime_url(backend_url: &str, anon_key: &str) -> GatewayResult<Url> {
    let mut url = Url::parse(backend_url)?.join("realtime/v1/websocket")?;
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|_| GatewayError::Realtime(format!("Cannot derive websocket URL from {backend_url}")))?;
    url.query_pairs_mut()
        .append_pair("apikey", anon_key)
        .append_pair("vsn", PROTOCOL_VSN);
    Ok(url)
}

// =============================================================================
// Transport
// =============================================================================

/// Why a connection loop ended.
enum LoopExit {
    /// Shutdown was requested or the subscriber went away.
    Stop,
    /// Connection lost; reconnect after backoff.
    Reconnect,
}

/// Background task that owns the WebSocket for one channel.
pub struct RealtimeTransport {
    config: RealtimeConfig,
    topic: String,
    events_tx: mpsc::Sender<ChangeEvent>,
    shutdown_rx: oneshot::Receiver<()>,
    next_ref: u64,
}

impl RealtimeTransport {
    /// Spawns the channel task and returns its subscription handle.
    pub fn spawn(config: RealtimeConfig) -> ChangeSubscription {
        let (events_tx, events_rx) = mpsc::channel(100);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let topic = protocol::table_topic(&config.table);

        let transport = RealtimeTransport {
            config,
            topic: topic.clone(),
            events_tx,
            shutdown_rx,
            next_ref: 0,
        };

        let task = tokio::spawn(transport.run());
        ChangeSubscription::new(topic, events_rx, shutdown_tx, Some(task))
    }

    /// Main transport loop.
    async fn run(mut self) {
        info!(topic = %self.topic, "Realtime channel starting");

        let mut backoff = self.create_backoff();
        let mut retry_count = 0u32;

        loop {
            let connected = tokio::select! {
                res = connect_with_timeout(&self.config) => res,
                _ = &mut self.shutdown_rx => {
                    info!("Shutdown while connecting");
                    break;
                }
            };

            match connected {
                Ok(ws_stream) => {
                    info!(topic = %self.topic, "Realtime socket connected");
                    backoff.reset();
                    retry_count = 0;

                    match self.connection_loop(ws_stream).await {
                        LoopExit::Stop => break,
                        LoopExit::Reconnect => {}
                    }
                }
                Err(e) => {
                    error!(?e, topic = %self.topic, "Failed to connect realtime socket");
                }
            }

            if self.config.max_retries > 0 {
                retry_count += 1;
                if retry_count >= self.config.max_retries {
                    error!(
                        max_retries = self.config.max_retries,
                        "Max realtime reconnection attempts reached"
                    );
                    break;
                }
            }

            let Some(duration) = backoff.next_backoff() else {
                error!("Backoff exhausted");
                break;
            };
            debug!(?duration, attempt = retry_count, "Waiting before realtime reconnect");

            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = &mut self.shutdown_rx => {
                    info!("Shutdown during backoff");
                    break;
                }
            }
        }

        info!(topic = %self.topic, "Realtime channel stopped");
    }

    fn next_ref(&mut self) -> u64 {
        self.next_ref += 1;
        self.next_ref
    }

    /// Joins the channel and pumps frames until shutdown or disconnect.
    async fn connection_loop(&mut self, ws_stream: WsStream) -> LoopExit {
        let (mut write, mut read) = ws_stream.split();

        let access_token = self
            .config
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone());
        let join_ref = self.next_ref();
        let join = PhoenixMessage::join(&self.config.table, access_token.as_deref(), join_ref);
        if let Err(e) = send(&mut write, &join).await {
            warn!(?e, "Failed to send join");
            return LoopExit::Reconnect;
        }
        let join_ref = join_ref.to_string();

        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        heartbeat.tick().await;

        loop {
            tokio::select! {
                frame = read.next() => {
                    let Some(frame) = frame else {
                        warn!("Realtime socket stream ended");
                        return LoopExit::Reconnect;
                    };
                    match frame {
                        Ok(WsMessage::Text(text)) => {
                            if let Some(exit) = self.handle_text(&text, &join_ref).await {
                                return exit;
                            }
                        }
                        Ok(WsMessage::Ping(data)) => {
                            if write.send(WsMessage::Pong(data)).await.is_err() {
                                return LoopExit::Reconnect;
                            }
                        }
                        Ok(WsMessage::Close(frame)) => {
                            info!(?frame, "Received close frame");
                            return LoopExit::Reconnect;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!(?e, "Realtime socket error");
                            return LoopExit::Reconnect;
                        }
                    }
                }

                _ = heartbeat.tick() => {
                    let beat = PhoenixMessage::heartbeat(self.next_ref());
                    if let Err(e) = send(&mut write, &beat).await {
                        warn!(?e, "Failed to send heartbeat");
                        return LoopExit::Reconnect;
                    }
                    debug!("Sent heartbeat");
                }

                _ = &mut self.shutdown_rx => {
                    info!(topic = %self.topic, "Leaving realtime channel");
                    let leave_ref = self.next_ref();
                    let leave = PhoenixMessage::leave(&self.topic, leave_ref);
                    let _ = send(&mut write, &leave).await;
                    let _ = write.send(WsMessage::Close(None)).await;
                    return LoopExit::Stop;
                }
            }
        }
    }

    /// Handles one text frame. Returns `Some` when the loop should end.
    async fn handle_text(&mut self, text: &str, join_ref: &str) -> Option<LoopExit> {
        let msg = match PhoenixMessage::from_json(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(?e, "Failed to parse realtime frame");
                return None;
            }
        };

        if msg.topic != self.topic {
            return None;
        }

        if msg.reference.as_deref() == Some(join_ref) {
            match msg.reply_status() {
                Some("ok") => info!(topic = %self.topic, "Joined realtime channel"),
                status => {
                    error!(?status, payload = %msg.payload, "Realtime join rejected");
                    return Some(LoopExit::Reconnect);
                }
            }
            return None;
        }

        if msg.event == protocol::EVENT_ERROR || msg.event == protocol::EVENT_CLOSE {
            warn!(event = %msg.event, "Realtime channel closed by server");
            return Some(LoopExit::Reconnect);
        }

        match msg.change_event()? {
            Ok(event) => {
                debug!(kind = ?event.kind, row_id = ?event.row_id(), "Realtime change");
                if self.events_tx.send(event).await.is_err() {
                    debug!("Change receiver dropped");
                    return Some(LoopExit::Stop);
                }
            }
            Err(e) => warn!(?e, "Failed to decode realtime change"),
        }
        None
    }

    /// Creates the exponential backoff configuration.
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_backoff,
            max_interval: self.config.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

async fn connect_with_timeout(config: &RealtimeConfig) -> GatewayResult<WsStream> {
    match timeout(config.connect_timeout, connect_async(config.url.as_str())).await {
        Ok(Ok((ws_stream, response))) => {
            debug!(status = ?response.status(), "WebSocket handshake complete");
            Ok(ws_stream)
        }
        Ok(Err(e)) => Err(GatewayError::Realtime(e.to_string())),
        Err(_) => Err(GatewayError::Realtime(format!(
            "Connection timeout after {} seconds",
            config.connect_timeout.as_secs()
        ))),
    }
}

async fn send<S>(write: &mut S, msg: &PhoenixMessage) -> GatewayResult<()>
where
    S: Sink<WsMessage> + Unpin,
    S::Error: std::fmt::Display,
{
    let json = msg
        .to_json()
        .map_err(|e| GatewayError::Realtime(e.to_string()))?;
    write
        .send(WsMessage::Text(json.into()))
        .await
        .map_err(|e| GatewayError::Realtime(e.to_string()))
}
