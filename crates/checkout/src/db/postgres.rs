//! `PostgreSQL` store.
//!
//! All tables live in the `checkout` schema. Queries are checked at runtime
//! (`sqlx::query_as` with `FromRow`) so the crate builds without a live
//! database.

use sqlx::{PgPool, Postgres, Transaction};

use securecart_core::{OrderId, PaymentId, Price, ProductId, UserId};

use super::{CheckoutStore, StoreError, StoreTx};
use crate::config::IsolationLevel;
use crate::models::{
    CartItem, CartLine, CheckoutLine, NewOrderLine, NewPaymentRecord, NewProduct, Order,
    OrderLine, OrderLineView, PaymentRecord, Product,
};

const PRODUCT_COLUMNS: &str = "id, name, description, price, stock, image_url, created_at";
const ORDER_COLUMNS: &str = "id, user_id, total_price, status, created_at, payment_id";
const PAYMENT_COLUMNS: &str =
    "id, user_id, card_number, card_holder, expiry_date, cvv, created_at";

/// Store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    isolation: IsolationLevel,
}

impl PgStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool, isolation: IsolationLevel) -> Self {
        Self { pool, isolation }
    }
}

impl CheckoutStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(self.isolation.set_transaction_sql())
            .execute(&mut *tx)
            .await?;
        Ok(PgTx { tx })
    }
}

/// An open `PostgreSQL` transaction.
///
/// Dropping it without calling `commit` rolls it back when the connection
/// returns to the pool.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl StoreTx for PgTx {
    async fn list_products(&mut self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM checkout.product ORDER BY id"
        ))
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM checkout.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn insert_product(&mut self, product: &NewProduct) -> Result<Product, StoreError> {
        let row = sqlx::query_as::<_, Product>(&format!(
            r"
            INSERT INTO checkout.product (name, description, price, stock, image_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock)
        .bind(&product.image_url)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn update_product(
        &mut self,
        id: ProductId,
        product: &NewProduct,
    ) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, Product>(&format!(
            r"
            UPDATE checkout.product
            SET name = $2, description = $3, price = $4, stock = $5, image_url = $6
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock)
        .bind(&product.image_url)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError> {
        // cart_line rows cascade; order_line rows block the delete
        let result = sqlx::query("DELETE FROM checkout.product WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: i32) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE checkout.product
            SET stock = stock - $2
            WHERE id = $1 AND stock >= $2
            ",
        )
        .bind(id)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn cart_items(&mut self, user_id: UserId) -> Result<Vec<CartItem>, StoreError> {
        let rows = sqlx::query_as::<_, CartItem>(
            r"
            SELECT c.product_id, p.name, p.price, p.image_url, c.quantity
            FROM checkout.cart_line c
            JOIN checkout.product p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.product_id
            ",
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn cart_line(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>, StoreError> {
        let row = sqlx::query_as::<_, CartLine>(
            r"
            SELECT user_id, product_id, quantity
            FROM checkout.cart_line
            WHERE user_id = $1 AND product_id = $2
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn upsert_cart_line(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartLine, StoreError> {
        let row = sqlx::query_as::<_, CartLine>(
            r"
            INSERT INTO checkout.cart_line (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
            RETURNING user_id, product_id, quantity
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn delete_cart_line(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM checkout.cart_line WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM checkout.cart_line WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn lock_checkout_lines(&mut self, user_id: UserId) -> Result<Vec<CheckoutLine>, StoreError> {
        let rows = sqlx::query_as::<_, CheckoutLine>(
            r"
            SELECT c.product_id, c.quantity, p.price, p.stock
            FROM checkout.cart_line c
            JOIN checkout.product p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.product_id
            FOR UPDATE OF p
            ",
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn insert_order(&mut self, user_id: UserId, total_price: Price) -> Result<Order, StoreError> {
        let row = sqlx::query_as::<_, Order>(&format!(
            r"
            INSERT INTO checkout.customer_order (user_id, total_price, status)
            VALUES ($1, $2, 'processing')
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(total_price)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn insert_order_line(
        &mut self,
        order_id: OrderId,
        line: &NewOrderLine,
    ) -> Result<OrderLine, StoreError> {
        let row = sqlx::query_as::<_, OrderLine>(
            r"
            INSERT INTO checkout.order_line (order_id, product_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, order_id, product_id, quantity, unit_price
            ",
        )
        .bind(order_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn order_for_user(
        &mut self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, Order>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM checkout.customer_order
            WHERE id = $1 AND user_id = $2
            FOR UPDATE
            "
        ))
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, Order>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM checkout.customer_order
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLineView>, StoreError> {
        let rows = sqlx::query_as::<_, OrderLineView>(
            r"
            SELECT ol.id, ol.product_id, ol.quantity, ol.unit_price, p.name, p.image_url
            FROM checkout.order_line ol
            JOIN checkout.product p ON p.id = ol.product_id
            WHERE ol.order_id = $1
            ORDER BY ol.id
            ",
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn mark_order_paid(
        &mut self,
        order_id: OrderId,
        payment_id: PaymentId,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE checkout.customer_order
            SET status = 'paid', payment_id = $2
            WHERE id = $1
            ",
        )
        .bind(order_id)
        .bind(payment_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_payment(&mut self, payment: &NewPaymentRecord) -> Result<PaymentRecord, StoreError> {
        let row = sqlx::query_as::<_, PaymentRecord>(&format!(
            r"
            INSERT INTO checkout.payment_card (user_id, card_number, card_holder, expiry_date, cvv)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PAYMENT_COLUMNS}
            "
        ))
        .bind(payment.user_id)
        .bind(&payment.card_number)
        .bind(&payment.card_holder)
        .bind(&payment.expiry_date)
        .bind(&payment.cvv)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn payment_for_user(
        &mut self,
        payment_id: PaymentId,
        user_id: UserId,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        let row = sqlx::query_as::<_, PaymentRecord>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM checkout.payment_card WHERE id = $1 AND user_id = $2"
        ))
        .bind(payment_id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
