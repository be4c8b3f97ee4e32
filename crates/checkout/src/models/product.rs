//! Product domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use securecart_core::{Price, ProductId};

/// `NUMERIC(precision, scale)` of `checkout.product.price` and
/// `checkout.order_line.unit_price`.
pub const PRICE_NUMERIC: (u32, u32) = (10, 2);

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Long-form description.
    pub description: Option<String>,
    /// Current unit price.
    pub price: Price,
    /// Units available. Never negative.
    pub stock: i32,
    /// Product image.
    pub image_url: Option<String>,
    /// When the product was added.
    pub created_at: DateTime<Utc>,
}

/// Fields for creating or fully replacing a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub stock: i32,
    pub image_url: Option<String>,
}
