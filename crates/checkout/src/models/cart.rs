//! Cart domain types.

use serde::Serialize;

use securecart_core::{Price, ProductId, UserId};

/// One stored cart row. Unique per (user, product).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub user_id: UserId,
    pub product_id: ProductId,
    /// Always greater than zero.
    pub quantity: i32,
}

/// A cart line joined with its product for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub image_url: Option<String>,
    pub quantity: i32,
}

impl CartItem {
    /// `price * quantity`, or `None` on overflow.
    #[must_use]
    pub fn line_total(&self) -> Option<Price> {
        self.price.checked_mul_quantity(self.quantity)
    }
}

/// A cart line joined with the live price and stock of its product, as read
/// (and locked) at the start of checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub quantity: i32,
    pub price: Price,
    pub stock: i32,
}
