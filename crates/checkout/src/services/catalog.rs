//! Product catalog administration.

use tracing::{info, instrument};

use securecart_core::ProductId;

use crate::config::TransactionPolicy;
use crate::db::{CheckoutStore, StoreError, StoreTx};
use crate::error::{CheckoutError, Result};
use crate::models::{NewProduct, PRICE_NUMERIC, Product};
use crate::services::run_transaction;

/// Maximum product name length.
const MAX_NAME_LENGTH: usize = 255;

/// Lists and edits products.
#[derive(Debug, Clone)]
pub struct CatalogService<S> {
    store: S,
    policy: TransactionPolicy,
}

impl<S: CheckoutStore> CatalogService<S> {
    /// Create a new catalog service.
    #[must_use]
    pub const fn new(store: S, policy: TransactionPolicy) -> Self {
        Self { store, policy }
    }

    /// All products, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Storage` if the store fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        run_transaction(&self.store, &self.policy, list_all).await
    }

    /// One product.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::ProductNotFound` if it does not exist.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: ProductId) -> Result<Product> {
        run_transaction(&self.store, &self.policy, |tx| find(tx, product_id)).await
    }

    /// Add a product.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidProduct` if the name is blank or too
    /// long, the price has sub-cent digits or too many integer digits, or the
    /// stock is negative.
    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(&self, product: &NewProduct) -> Result<Product> {
        validate_product(product)?;
        let created =
            run_transaction(&self.store, &self.policy, |tx| insert(tx, product)).await?;
        info!(product_id = %created.id, "Product created");
        Ok(created)
    }

    /// Add several products in one transaction. Either all are created or none.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidProduct` if any product fails validation,
    /// before anything is written.
    #[instrument(skip(self, products), fields(count = products.len()))]
    pub async fn create_products(&self, products: &[NewProduct]) -> Result<Vec<Product>> {
        for product in products {
            validate_product(product)?;
        }
        let created =
            run_transaction(&self.store, &self.policy, |tx| insert_all(tx, products)).await?;
        info!(count = created.len(), "Products created");
        Ok(created)
    }

    /// Replace every editable field of a product.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidProduct` on bad fields or
    /// `CheckoutError::ProductNotFound` if it does not exist.
    #[instrument(skip(self, product), fields(product_id = %product_id))]
    pub async fn update_product(&self, product_id: ProductId, product: &NewProduct) -> Result<Product> {
        validate_product(product)?;
        run_transaction(&self.store, &self.policy, |tx| update(tx, product_id, product)).await
    }

    /// Delete a product and drop it from every cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::ProductNotFound` if it does not exist or
    /// `CheckoutError::ProductInUse` if past orders reference it.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn delete_product(&self, product_id: ProductId) -> Result<()> {
        run_transaction(&self.store, &self.policy, |tx| delete(tx, product_id)).await?;
        info!("Product deleted");
        Ok(())
    }
}

/// Check fields the schema would otherwise reject or round.
///
/// `Price` already rules out negative amounts; here it must also fit the
/// stored column exactly, so every store keeps the same cents.
fn validate_product(product: &NewProduct) -> Result<()> {
    let name = product.name.trim();
    if name.is_empty() {
        return Err(CheckoutError::InvalidProduct("name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(CheckoutError::InvalidProduct(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    let (precision, scale) = PRICE_NUMERIC;
    if !product.price.fits_numeric(precision, scale) {
        return Err(CheckoutError::InvalidProduct(format!(
            "price must have at most {} integer digits and {scale} decimal places",
            precision - scale
        )));
    }
    if product.stock < 0 {
        return Err(CheckoutError::InvalidProduct(format!(
            "stock must not be negative (got {})",
            product.stock
        )));
    }
    Ok(())
}

async fn list_all<T: StoreTx>(mut tx: T) -> Result<Vec<Product>> {
    let products = tx.list_products().await?;
    tx.commit().await?;
    Ok(products)
}

async fn find<T: StoreTx>(mut tx: T, product_id: ProductId) -> Result<Product> {
    let product = tx
        .product(product_id)
        .await?
        .ok_or(CheckoutError::ProductNotFound { product_id })?;
    tx.commit().await?;
    Ok(product)
}

async fn insert<T: StoreTx>(mut tx: T, product: &NewProduct) -> Result<Product> {
    let created = tx.insert_product(product).await?;
    tx.commit().await?;
    Ok(created)
}

async fn insert_all<T: StoreTx>(mut tx: T, products: &[NewProduct]) -> Result<Vec<Product>> {
    let mut created = Vec::with_capacity(products.len());
    for product in products {
        created.push(tx.insert_product(product).await?);
    }
    tx.commit().await?;
    Ok(created)
}

async fn update<T: StoreTx>(mut tx: T, product_id: ProductId, product: &NewProduct) -> Result<Product> {
    let updated = tx
        .update_product(product_id, product)
        .await?
        .ok_or(CheckoutError::ProductNotFound { product_id })?;
    tx.commit().await?;
    Ok(updated)
}

async fn delete<T: StoreTx>(mut tx: T, product_id: ProductId) -> Result<()> {
    let deleted = tx.delete_product(product_id).await.map_err(|e| match e {
        StoreError::Constraint(_) => CheckoutError::ProductInUse { product_id },
        other => CheckoutError::Storage(other),
    })?;
    if !deleted {
        return Err(CheckoutError::ProductNotFound { product_id });
    }
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use securecart_core::Price;

    use super::*;

    fn product(name: &str, stock: i32) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: None,
            price: Price::from_cents(1999).unwrap(),
            stock,
            image_url: None,
        }
    }

    #[test]
    fn test_validate_product() {
        assert!(validate_product(&product("Keyboard", 0)).is_ok());
        assert!(matches!(
            validate_product(&product("   ", 1)),
            Err(CheckoutError::InvalidProduct(_))
        ));
        assert!(matches!(
            validate_product(&product("Keyboard", -1)),
            Err(CheckoutError::InvalidProduct(_))
        ));
        assert!(matches!(
            validate_product(&product(&"x".repeat(MAX_NAME_LENGTH + 1), 1)),
            Err(CheckoutError::InvalidProduct(_))
        ));
    }

    fn priced(price: &str) -> NewProduct {
        NewProduct {
            price: price.parse().unwrap(),
            ..product("Keyboard", 1)
        }
    }

    #[test]
    fn test_price_must_fit_two_decimal_places() {
        assert!(validate_product(&priced("10.50")).is_ok());
        assert!(validate_product(&priced("10.500")).is_ok());
        assert!(matches!(
            validate_product(&priced("10.005")),
            Err(CheckoutError::InvalidProduct(_))
        ));
    }

    #[test]
    fn test_price_must_fit_eight_integer_digits() {
        assert!(validate_product(&priced("99999999.99")).is_ok());
        assert!(matches!(
            validate_product(&priced("100000000")),
            Err(CheckoutError::InvalidProduct(_))
        ));
    }
}
