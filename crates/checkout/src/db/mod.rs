//! Storage for checkout.
//!
//! The services talk to storage only through [`CheckoutStore`] and
//! [`StoreTx`]. Every operation happens inside a transaction: nothing written
//! through a [`StoreTx`] is visible to anyone else until [`StoreTx::commit`]
//! succeeds, and dropping a transaction without committing discards it.
//!
//! # Implementations
//!
//! - [`PgStore`] - `PostgreSQL` via sqlx (schema `checkout`)
//! - [`MemoryStore`] - in-process store with optimistic serializable commits
//!
//! # Migrations
//!
//! Migrations are stored in `crates/checkout/migrations/` and run via:
//! ```bash
//! cargo run -p securecart-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use securecart_core::{OrderId, PaymentId, Price, ProductId, UserId};

use crate::models::{
    CartItem, CartLine, CheckoutLine, NewOrderLine, NewPaymentRecord, NewProduct, Order,
    OrderLine, OrderLineView, PaymentRecord, Product,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// The transaction lost a serialization race and was aborted.
    ///
    /// Safe to retry with a fresh transaction.
    #[error("transaction conflict")]
    Conflict,

    /// A write was rejected by a schema constraint.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            // 40001 serialization_failure, 40P01 deadlock_detected
            if matches!(db_err.code().as_deref(), Some("40001" | "40P01")) {
                return Self::Conflict;
            }
            if db_err.is_foreign_key_violation() || db_err.is_check_violation() {
                return Self::Constraint(db_err.message().to_owned());
            }
        }
        Self::Database(err)
    }
}

/// A store that can open checkout transactions.
pub trait CheckoutStore: Clone + Send + Sync + 'static {
    /// Transaction handle type.
    type Tx: StoreTx;

    /// Begin a new transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;
}

/// Reads and writes inside one transaction.
///
/// Reads observe a consistent snapshot plus this transaction's own writes.
pub trait StoreTx: Send {
    // ---- products -------------------------------------------------------

    /// All products, ordered by id.
    fn list_products(&mut self) -> impl Future<Output = Result<Vec<Product>, StoreError>> + Send;

    /// One product by id.
    fn product(
        &mut self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, StoreError>> + Send;

    /// Insert a product.
    fn insert_product(
        &mut self,
        product: &NewProduct,
    ) -> impl Future<Output = Result<Product, StoreError>> + Send;

    /// Replace every editable field of a product. `None` if it does not exist.
    fn update_product(
        &mut self,
        id: ProductId,
        product: &NewProduct,
    ) -> impl Future<Output = Result<Option<Product>, StoreError>> + Send;

    /// Delete a product and any cart lines holding it.
    ///
    /// Fails with `StoreError::Constraint` if an order line references it.
    fn delete_product(
        &mut self,
        id: ProductId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Decrement stock by `quantity` if at least that much is available.
    ///
    /// Returns `false` (and changes nothing) when stock is insufficient or the
    /// product does not exist.
    fn decrement_stock(
        &mut self,
        id: ProductId,
        quantity: i32,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    // ---- carts ----------------------------------------------------------

    /// A user's cart joined with product details, ordered by product id.
    fn cart_items(
        &mut self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<CartItem>, StoreError>> + Send;

    /// One cart line.
    fn cart_line(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
    ) -> impl Future<Output = Result<Option<CartLine>, StoreError>> + Send;

    /// Insert or overwrite the quantity of a cart line.
    fn upsert_cart_line(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> impl Future<Output = Result<CartLine, StoreError>> + Send;

    /// Delete one cart line. Returns whether it existed.
    fn delete_cart_line(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Delete every cart line of a user. Returns how many were removed.
    fn clear_cart(&mut self, user_id: UserId) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// A user's cart joined with live price and stock, ordered by ascending
    /// product id, with the product rows locked until the transaction ends.
    fn lock_checkout_lines(
        &mut self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<CheckoutLine>, StoreError>> + Send;

    // ---- orders ---------------------------------------------------------

    /// Insert an order in `processing` status.
    fn insert_order(
        &mut self,
        user_id: UserId,
        total_price: Price,
    ) -> impl Future<Output = Result<Order, StoreError>> + Send;

    /// Insert one frozen order line.
    fn insert_order_line(
        &mut self,
        order_id: OrderId,
        line: &NewOrderLine,
    ) -> impl Future<Output = Result<OrderLine, StoreError>> + Send;

    /// An order owned by `user_id`, locked until the transaction ends.
    ///
    /// Orders belonging to other users are reported as absent.
    fn order_for_user(
        &mut self,
        order_id: OrderId,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Order>, StoreError>> + Send;

    /// All orders of a user, newest first.
    fn orders_for_user(
        &mut self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Order>, StoreError>> + Send;

    /// Lines of an order joined with product name and image, by line id.
    fn order_lines(
        &mut self,
        order_id: OrderId,
    ) -> impl Future<Output = Result<Vec<OrderLineView>, StoreError>> + Send;

    /// Set `status = paid` and link the payment. Returns whether the order existed.
    fn mark_order_paid(
        &mut self,
        order_id: OrderId,
        payment_id: PaymentId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    // ---- payments -------------------------------------------------------

    /// Insert a payment record.
    fn insert_payment(
        &mut self,
        payment: &NewPaymentRecord,
    ) -> impl Future<Output = Result<PaymentRecord, StoreError>> + Send;

    /// A payment record owned by `user_id`.
    fn payment_for_user(
        &mut self,
        payment_id: PaymentId,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<PaymentRecord>, StoreError>> + Send;

    // ---- lifecycle ------------------------------------------------------

    /// Make every write of this transaction visible atomically.
    ///
    /// Fails with `StoreError::Conflict` if a concurrent commit invalidated
    /// what this transaction read.
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Discard every write of this transaction.
    fn rollback(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `max_connections` - upper bound on pooled connections
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
