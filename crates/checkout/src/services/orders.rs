//! Order engine.
//!
//! Converts a user's cart into an order in one transaction:
//!
//! 1. Read the cart joined with live price and stock, locking the product rows.
//! 2. Reject an empty cart, any non-positive quantity, and any line whose
//!    quantity exceeds stock. Nothing is written if any line fails.
//! 3. Total `quantity * price` over all lines with decimal arithmetic.
//! 4. Insert the order, then per line (ascending product id) decrement stock
//!    and freeze the line with its current unit price.
//! 5. Clear the cart and commit.

use tracing::{info, instrument};

use securecart_core::{OrderId, Price, UserId};

use crate::config::TransactionPolicy;
use crate::db::{CheckoutStore, StoreTx};
use crate::error::{CheckoutError, Result};
use crate::models::{CheckoutLine, NewOrderLine, OrderWithLines, TOTAL_NUMERIC};
use crate::services::run_transaction;

/// Validated checkout: lines in ascending product id and their exact total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    pub lines: Vec<NewOrderLine>,
    pub total_price: Price,
}

/// Validate cart lines against live stock and compute the order total.
///
/// # Errors
///
/// - `CheckoutError::EmptyCart` if there are no lines
/// - `CheckoutError::InvalidQuantity` for a quantity of zero or less
/// - `CheckoutError::InsufficientStock` naming the first (lowest id) product
///   whose quantity exceeds its stock
/// - `CheckoutError::TotalOverflow` if the running total stops fitting the
///   stored order total
pub fn plan_checkout(mut lines: Vec<CheckoutLine>) -> Result<CheckoutPlan> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    lines.sort_by_key(|line| line.product_id);

    let mut total_price = Price::ZERO;
    let mut planned = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity <= 0 {
            return Err(CheckoutError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }
        if line.quantity > line.stock {
            return Err(CheckoutError::InsufficientStock {
                product_id: line.product_id,
            });
        }
        total_price = line
            .price
            .checked_mul_quantity(line.quantity)
            .and_then(|subtotal| total_price.checked_add(subtotal))
            .filter(|total| total.fits_numeric(TOTAL_NUMERIC.0, TOTAL_NUMERIC.1))
            .ok_or(CheckoutError::TotalOverflow {
                product_id: line.product_id,
            })?;
        planned.push(NewOrderLine {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.price,
        });
    }

    Ok(CheckoutPlan {
        lines: planned,
        total_price,
    })
}

/// Creates and reads orders.
#[derive(Debug, Clone)]
pub struct OrderEngine<S> {
    store: S,
    policy: TransactionPolicy,
}

impl<S: CheckoutStore> OrderEngine<S> {
    /// Create a new order engine.
    #[must_use]
    pub const fn new(store: S, policy: TransactionPolicy) -> Self {
        Self { store, policy }
    }

    /// Check out the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCart`, `InvalidQuantity` or `InsufficientStock` when the
    /// cart cannot be fulfilled, `Contention` if the stock race is lost twice,
    /// `Timeout` if an attempt runs too long, or `Storage` for store
    /// failures. On every error the cart, stock and orders are unchanged.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn create_order(&self, user_id: UserId) -> Result<OrderWithLines> {
        let order = run_transaction(&self.store, &self.policy, |tx| checkout(tx, user_id)).await?;

        info!(
            order_id = %order.order.id,
            total_price = %order.order.total_price,
            lines = order.lines.len(),
            "Order created"
        );
        Ok(order)
    }

    /// All orders of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Storage` if the store fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<OrderWithLines>> {
        run_transaction(&self.store, &self.policy, |tx| orders_for(tx, user_id)).await
    }

    /// One order of a user, with its lines.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if the order does not exist or
    /// belongs to another user.
    #[instrument(skip(self), fields(user_id = %user_id, order_id = %order_id))]
    pub async fn get_order(&self, user_id: UserId, order_id: OrderId) -> Result<OrderWithLines> {
        run_transaction(&self.store, &self.policy, |tx| order_with_lines(tx, user_id, order_id))
            .await
    }
}

async fn checkout<T: StoreTx>(mut tx: T, user_id: UserId) -> Result<OrderWithLines> {
    let cart = tx.lock_checkout_lines(user_id).await?;
    let plan = plan_checkout(cart)?;

    let order = tx.insert_order(user_id, plan.total_price).await?;
    for line in &plan.lines {
        // Guarded decrement; only fails if stock moved after it was locked.
        if !tx.decrement_stock(line.product_id, line.quantity).await? {
            return Err(CheckoutError::InsufficientStock {
                product_id: line.product_id,
            });
        }
        tx.insert_order_line(order.id, line).await?;
    }
    tx.clear_cart(user_id).await?;

    let lines = tx.order_lines(order.id).await?;
    tx.commit().await?;
    Ok(OrderWithLines { order, lines })
}

async fn orders_for<T: StoreTx>(mut tx: T, user_id: UserId) -> Result<Vec<OrderWithLines>> {
    let orders = tx.orders_for_user(user_id).await?;
    let mut with_lines = Vec::with_capacity(orders.len());
    for order in orders {
        let lines = tx.order_lines(order.id).await?;
        with_lines.push(OrderWithLines { order, lines });
    }
    tx.commit().await?;
    Ok(with_lines)
}

async fn order_with_lines<T: StoreTx>(
    mut tx: T,
    user_id: UserId,
    order_id: OrderId,
) -> Result<OrderWithLines> {
    let order = tx
        .order_for_user(order_id, user_id)
        .await?
        .ok_or(CheckoutError::OrderNotFound { order_id })?;
    let lines = tx.order_lines(order_id).await?;
    tx.commit().await?;
    Ok(OrderWithLines { order, lines })
}
