//! Order domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use securecart_core::{OrderId, OrderLineId, OrderStatus, PaymentId, Price, ProductId, UserId};

/// `NUMERIC(precision, scale)` of `checkout.customer_order.total_price`.
pub const TOTAL_NUMERIC: (u32, u32) = (14, 2);

/// A committed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Sum of `quantity * unit_price` over the order lines, fixed at creation.
    pub total_price: Price,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    /// Set when a payment record is linked.
    pub payment_id: Option<PaymentId>,
}

/// Line to freeze into an order at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Price,
}

/// A stored order line. Immutable once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    /// Price at the time of purchase, not the live product price.
    pub unit_price: Price,
}

/// An order line joined back to its product name and image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct OrderLineView {
    pub id: OrderLineId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Price,
    pub name: String,
    pub image_url: Option<String>,
}

/// An order with its lines attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderWithLines {
    #[serde(flatten)]
    pub order: Order,
    pub lines: Vec<OrderLineView>,
}

impl OrderWithLines {
    /// Recompute `Σ quantity * unit_price` from the lines.
    ///
    /// Returns `None` on overflow. For a well-formed order this always equals
    /// `order.total_price`.
    #[must_use]
    pub fn lines_total(&self) -> Option<Price> {
        self.lines.iter().try_fold(Price::ZERO, |acc, line| {
            acc.checked_add(line.unit_price.checked_mul_quantity(line.quantity)?)
        })
    }
}
