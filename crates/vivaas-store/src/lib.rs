//! # vivaas-store: Local Product Cache
//!
//! A volatile, process-lifetime cache of products that the sync service
//! falls back to when the backend cannot be reached.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ProductSyncService ──── fetch ok ────► replace_all(rows)               │
//! │          │                                                              │
//! │          └────────── fetch failed ────► list()  (last known set)        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 vivaas-store (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   Vec<Product>  (ordered, no eviction, no persistence)          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The store is an explicitly owned value, not a global. It has no lock of
//! its own: every operation is synchronous and completes in one call, and
//! the owner decides how to share it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vivaas_store::LocalProductStore;
//!
//! let mut cache = LocalProductStore::new();
//! cache.replace_all(fetched);
//! let snapshot = cache.list();
//! ```

pub mod store;

pub use store::LocalProductStore;
