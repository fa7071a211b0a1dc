//! # Wire Rows
//!
//! The `products` table as the backend sends it (snake_case columns, decimal
//! price, percentage discount) and the one function that turns it into a
//! domain [`Product`].
//!
//! ```text
//!   table fetch ─┐
//!                ├──► ProductRow ──► into_product() ──► Product
//!   realtime   ──┘
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use vivaas_core::{DiscountRate, Money, NewProduct, Product};

use super::error::{GatewayError, GatewayResult};

// =============================================================================
// Product Row
// =============================================================================

/// One row of the products table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub item_number: String,
    pub price: f64,
    #[serde(default)]
    pub discount_percentage: Option<f64>,
    pub stock: i64,
    #[serde(default)]
    pub low_stock_threshold: Option<i64>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl ProductRow {
    /// Maps a wire row to a domain product.
    ///
    /// Every path that receives rows (fetch, insert, update, realtime) goes
    /// through here.
    pub fn into_product(self) -> GatewayResult<Product> {
        let price = Money::from_decimal(self.price)
            .ok_or_else(|| self.decode_error(format!("invalid price {}", self.price)))?;

        let stock = u32::try_from(self.stock)
            .map_err(|_| self.decode_error(format!("invalid stock {}", self.stock)))?;

        let low_stock_threshold = match self.low_stock_threshold {
            Some(t) => u32::try_from(t)
                .map_err(|_| self.decode_error(format!("invalid low_stock_threshold {t}")))?,
            None => vivaas_core::DEFAULT_LOW_STOCK_THRESHOLD,
        };

        let created_at = parse_timestamp(self.created_at.as_deref())
            .ok_or_else(|| self.decode_error("invalid created_at".to_string()))?;
        let updated_at = match self.updated_at.as_deref() {
            Some(_) => parse_timestamp(self.updated_at.as_deref())
                .ok_or_else(|| self.decode_error("invalid updated_at".to_string()))?,
            None => created_at,
        };

        Ok(Product {
            id: self.id,
            name: self.name,
            brand: self.brand.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
            item_number: self.item_number,
            price_cents: price.cents(),
            discount_bps: DiscountRate::from_percentage(self.discount_percentage.unwrap_or(0.0))
                .bps(),
            stock,
            low_stock_threshold,
            image: self.image.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            size: self.size,
            color: self.color,
            created_at,
            updated_at,
        })
    }

    fn decode_error(&self, message: String) -> GatewayError {
        GatewayError::Decode {
            message: format!("product {}: {}", self.id, message),
            body: serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

/// Parses the timestamp forms the backend emits.
///
/// The table API sends RFC 3339 with an offset; realtime payloads may omit
/// it, in which case the value is UTC.
fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

// =============================================================================
// Insert Row
// =============================================================================

/// Body of an insert. The backend assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProductRow {
    pub name: String,
    pub price: f64,
    pub stock: u32,
    pub brand: String,
    pub category: String,
    pub item_number: String,
    pub discount_percentage: f64,
    pub low_stock_threshold: u32,
    pub image: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl NewProductRow {
    /// Builds the insert body, applying `default_threshold` when the
    /// candidate has none.
    pub fn from_candidate(candidate: &NewProduct, default_threshold: u32) -> Self {
        NewProductRow {
            name: candidate.name.trim().to_string(),
            price: Money::from_cents(candidate.price_cents).to_decimal(),
            stock: candidate.stock,
            brand: candidate.brand.trim().to_string(),
            category: candidate.category.trim().to_string(),
            item_number: candidate.item_number.trim().to_string(),
            discount_percentage: DiscountRate::from_bps(candidate.discount_bps).percentage(),
            low_stock_threshold: candidate.low_stock_threshold.unwrap_or(default_threshold),
            image: candidate.image.clone(),
            description: candidate.description.clone(),
            size: candidate.size.clone(),
            color: candidate.color.clone(),
        }
    }
}

// =============================================================================
// Update Patch
// =============================================================================

/// Body of an update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_stock_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `Some(None)` clears the column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Option<String>>,
    pub updated_at: String,
}

impl ProductPatch {
    /// Full-record replace of every mutable field.
    pub fn full(product: &Product, now: DateTime<Utc>) -> Self {
        ProductPatch {
            name: Some(product.name.clone()),
            price: Some(product.price().to_decimal()),
            stock: Some(product.stock),
            brand: Some(product.brand.clone()),
            category: Some(product.category.clone()),
            item_number: Some(product.item_number.clone()),
            discount_percentage: Some(product.discount().percentage()),
            low_stock_threshold: Some(product.low_stock_threshold),
            image: Some(product.image.clone()),
            description: Some(product.description.clone()),
            size: Some(product.size.clone()),
            color: Some(product.color.clone()),
            updated_at: now.to_rfc3339(),
        }
    }

    /// Stock-only change.
    pub fn stock(stock: u32, now: DateTime<Utc>) -> Self {
        ProductPatch {
            stock: Some(stock),
            updated_at: now.to_rfc3339(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire() -> serde_json::Value {
        json!({
            "id": "5a1e",
            "name": "Linen Shirt",
            "brand": "Vivaas",
            "category": "Shirts",
            "item_number": "SHT-204",
            "price": 1299.5,
            "discount_percentage": 12.5,
            "stock": 7,
            "low_stock_threshold": 3,
            "image": null,
            "description": "Breathable linen",
            "size": "L",
            "color": null,
            "created_at": "2024-04-01T10:00:00.123456+00:00",
            "updated_at": "2024-04-02T08:30:00+00:00"
        })
    }

    #[test]
    fn test_row_maps_to_product() {
        let row: ProductRow = serde_json::from_value(wire()).unwrap();
        let product = row.into_product().unwrap();

        assert_eq!(product.id, "5a1e");
        assert_eq!(product.item_number, "SHT-204");
        assert_eq!(product.price_cents, 129_950);
        assert_eq!(product.discount_bps, 1_250);
        assert_eq!(product.stock, 7);
        assert_eq!(product.low_stock_threshold, 3);
        assert_eq!(product.image, "");
        assert_eq!(product.size.as_deref(), Some("L"));
        assert!(product.updated_at > product.created_at);
    }

    #[test]
    fn test_missing_optionals_get_defaults() {
        let row: ProductRow = serde_json::from_value(json!({
            "id": "1",
            "name": "Scarf",
            "item_number": "SCF-1",
            "price": 250,
            "stock": 2,
            "created_at": "2024-04-01T10:00:00"
        }))
        .unwrap();
        let product = row.into_product().unwrap();
        assert_eq!(product.low_stock_threshold, 5);
        assert_eq!(product.discount_bps, 0);
        assert_eq!(product.updated_at, product.created_at);
    }

    #[test]
    fn test_negative_stock_is_rejected() {
        let mut value = wire();
        value["stock"] = json!(-1);
        let row: ProductRow = serde_json::from_value(value).unwrap();
        assert!(matches!(row.into_product(), Err(GatewayError::Decode { .. })));
    }

    #[test]
    fn test_insert_row_applies_defaults() {
        let candidate = NewProduct {
            name: " Linen Shirt ".to_string(),
            brand: "Vivaas".to_string(),
            category: "Shirts".to_string(),
            item_number: "SHT-204".to_string(),
            price_cents: 129_950,
            discount_bps: 0,
            stock: 4,
            low_stock_threshold: None,
            image: String::new(),
            description: String::new(),
            size: None,
            color: None,
        };
        let row = NewProductRow::from_candidate(&candidate, 5);
        let body = serde_json::to_value(&row).unwrap();

        assert_eq!(body["name"], "Linen Shirt");
        assert_eq!(body["price"], 1299.5);
        assert_eq!(body["low_stock_threshold"], 5);
        assert_eq!(body["discount_percentage"], 0.0);
        assert!(body.get("size").is_none());
        assert!(body.get("id").is_none());
    }

    #[test]
    fn test_stock_patch_only_sends_stock() {
        let body = serde_json::to_value(ProductPatch::stock(4, Utc::now())).unwrap();
        let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 2);
        assert_eq!(body["stock"], 4);
    }
}
