//! # Realtime
//!
//! Server-pushed row changes for the products table.
//!
//! ```text
//! RealtimeTransport ──ChangeEvent──► ChangeSubscription ──► RealtimeFeed
//!   (WebSocket task)                   (handle + mpsc)        (merge + notify)
//! ```

pub mod channel;
pub mod feed;
pub mod protocol;
pub mod transport;

pub use channel::{ChangeEvent, ChangeKind, ChangeSubscription};
pub use feed::{merge_change, ChangeHandler, ProductChange, RealtimeFeed};
pub use protocol::PhoenixMessage;
pub use transport::{realtime_url, RealtimeConfig, RealtimeTransport};
