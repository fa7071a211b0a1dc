//! # Local Product Store
//!
//! Synchronous CRUD over an ordered collection of products.
//!
//! "Not found" is an absence, never an error: `get_by_id` returns `None`
//! and `update`/`remove` on an unknown id do nothing.

use tracing::trace;
use vivaas_core::Product;

/// In-memory product cache.
///
/// ## Usage
/// ```rust
/// use vivaas_store::LocalProductStore;
///
/// let store = LocalProductStore::new();
/// assert!(store.is_empty());
/// assert!(store.get_by_id("missing").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct LocalProductStore {
    products: Vec<Product>,
}

impl LocalProductStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `products`.
    pub fn with_products(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// Snapshot copy of every product, in insertion order.
    ///
    /// Mutating the returned vector does not touch the store.
    pub fn list(&self) -> Vec<Product> {
        self.products.clone()
    }

    /// Looks up a product by backend id.
    pub fn get_by_id(&self, id: &str) -> Option<Product> {
        self.products.iter().find(|p| p.id == id).cloned()
    }

    /// Looks up a product by item number.
    pub fn get_by_item_number(&self, item_number: &str) -> Option<Product> {
        self.products
            .iter()
            .find(|p| p.item_number == item_number)
            .cloned()
    }

    /// Swaps the whole backing collection.
    pub fn replace_all(&mut self, products: Vec<Product>) {
        trace!(count = products.len(), "Replacing cached products");
        self.products = products;
    }

    /// Appends a product. Uniqueness is the caller's concern.
    pub fn add(&mut self, product: Product) {
        self.products.push(product);
    }

    /// Replaces the entry with the same id. No-op if absent.
    pub fn update(&mut self, product: Product) {
        if let Some(slot) = self.products.iter_mut().find(|p| p.id == product.id) {
            *slot = product;
        }
    }

    /// Inserts or replaces by id, keeping position for existing entries.
    pub fn upsert(&mut self, product: Product) {
        match self.products.iter_mut().find(|p| p.id == product.id) {
            Some(slot) => *slot = product,
            None => self.products.push(product),
        }
    }

    /// Removes the entry with `id`. No-op if absent.
    pub fn remove(&mut self, id: &str) {
        self.products.retain(|p| p.id != id);
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
