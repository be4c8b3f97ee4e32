//! Cart operations.
//!
//! A cart holds at most one line per product. Adding a product that is
//! already in the cart merges quantities, and the merged quantity must fit
//! the product's current stock. Stock is only checked here as a courtesy;
//! checkout re-checks it under lock.

use tracing::{debug, instrument};

use securecart_core::{ProductId, UserId};

use crate::config::TransactionPolicy;
use crate::db::{CheckoutStore, StoreTx};
use crate::error::{CheckoutError, Result};
use crate::models::{CartItem, CartLine};
use crate::services::run_transaction;

/// Reads and edits carts.
#[derive(Debug, Clone)]
pub struct CartService<S> {
    store: S,
    policy: TransactionPolicy,
}

impl<S: CheckoutStore> CartService<S> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(store: S, policy: TransactionPolicy) -> Self {
        Self { store, policy }
    }

    /// The user's cart with product details, ordered by product id.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Storage` if the store fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<Vec<CartItem>> {
        run_transaction(&self.store, &self.policy, |tx| items(tx, user_id)).await
    }

    /// Add `quantity` units of a product, merging with an existing line.
    ///
    /// # Errors
    ///
    /// - `InvalidQuantity` if `quantity <= 0`
    /// - `ProductNotFound` if the product does not exist
    /// - `InsufficientStock` if the merged quantity exceeds stock
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartLine> {
        require_positive(product_id, quantity)?;
        let line = run_transaction(&self.store, &self.policy, |tx| {
            add(tx, user_id, product_id, quantity)
        })
        .await?;
        debug!(quantity = line.quantity, "Cart line updated");
        Ok(line)
    }

    /// Set the quantity of a line already in the cart.
    ///
    /// # Errors
    ///
    /// - `InvalidQuantity` if `quantity <= 0`
    /// - `CartLineNotFound` if the product is not in the cart
    /// - `InsufficientStock` if `quantity` exceeds stock
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartLine> {
        require_positive(product_id, quantity)?;
        run_transaction(&self.store, &self.policy, |tx| {
            set_quantity(tx, user_id, product_id, quantity)
        })
        .await
    }

    /// Remove a product from the cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::CartLineNotFound` if it is not in the cart.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn remove_item(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        run_transaction(&self.store, &self.policy, |tx| remove(tx, user_id, product_id)).await
    }

    /// Empty the cart. Returns how many lines were removed.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Storage` if the store fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear(&self, user_id: UserId) -> Result<u64> {
        run_transaction(&self.store, &self.policy, |tx| clear(tx, user_id)).await
    }
}

fn require_positive(product_id: ProductId, quantity: i32) -> Result<()> {
    if quantity <= 0 {
        return Err(CheckoutError::InvalidQuantity {
            product_id,
            quantity,
        });
    }
    Ok(())
}

async fn items<T: StoreTx>(mut tx: T, user_id: UserId) -> Result<Vec<CartItem>> {
    let items = tx.cart_items(user_id).await?;
    tx.commit().await?;
    Ok(items)
}

async fn add<T: StoreTx>(
    mut tx: T,
    user_id: UserId,
    product_id: ProductId,
    quantity: i32,
) -> Result<CartLine> {
    let product = tx
        .product(product_id)
        .await?
        .ok_or(CheckoutError::ProductNotFound { product_id })?;
    let existing = tx
        .cart_line(user_id, product_id)
        .await?
        .map_or(0, |line| line.quantity);

    let merged = existing
        .checked_add(quantity)
        .ok_or(CheckoutError::InvalidQuantity {
            product_id,
            quantity,
        })?;
    if merged > product.stock {
        return Err(CheckoutError::InsufficientStock { product_id });
    }

    let line = tx.upsert_cart_line(user_id, product_id, merged).await?;
    tx.commit().await?;
    Ok(line)
}

async fn set_quantity<T: StoreTx>(
    mut tx: T,
    user_id: UserId,
    product_id: ProductId,
    quantity: i32,
) -> Result<CartLine> {
    if tx.cart_line(user_id, product_id).await?.is_none() {
        return Err(CheckoutError::CartLineNotFound { product_id });
    }
    let product = tx
        .product(product_id)
        .await?
        .ok_or(CheckoutError::CartLineNotFound { product_id })?;
    if quantity > product.stock {
        return Err(CheckoutError::InsufficientStock { product_id });
    }

    let line = tx.upsert_cart_line(user_id, product_id, quantity).await?;
    tx.commit().await?;
    Ok(line)
}

async fn remove<T: StoreTx>(mut tx: T, user_id: UserId, product_id: ProductId) -> Result<()> {
    if !tx.delete_cart_line(user_id, product_id).await? {
        return Err(CheckoutError::CartLineNotFound { product_id });
    }
    tx.commit().await?;
    Ok(())
}

async fn clear<T: StoreTx>(mut tx: T, user_id: UserId) -> Result<u64> {
    let removed = tx.clear_cart(user_id).await?;
    tx.commit().await?;
    Ok(removed)
}
