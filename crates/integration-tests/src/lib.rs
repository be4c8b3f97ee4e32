//! Integration tests for SecureCart checkout against `PostgreSQL`.
//!
//! # Running Tests
//!
//! ```bash
//! export CHECKOUT_DATABASE_URL=postgres://localhost/securecart_test
//! cargo test -p securecart-integration-tests -- --ignored
//! ```
//!
//! Migrations are applied on first connect. Every test works on products it
//! creates itself and on random user ids, so tests can share one database and
//! run in parallel.

use rand::Rng;
use secrecy::SecretString;
use sqlx::PgPool;

use securecart_checkout::db::create_pool;
use securecart_checkout::models::{NewProduct, Product};
use securecart_checkout::{
    Checkout, CheckoutConfig, CheckoutError, CheckoutStore, EncryptionConfig, EncryptionService,
    IsolationLevel, PgStore, StoreError, StoreTx, TransactionPolicy,
};
use securecart_core::{Price, ProductId, UserId};

/// Error type for test setup.
pub type SetupError = Box<dyn std::error::Error + Send + Sync>;

/// A connected checkout over a migrated test database.
pub struct TestContext {
    pub pool: PgPool,
    pub store: PgStore,
    pub checkout: Checkout<PgStore>,
}

impl TestContext {
    /// Connect with `SERIALIZABLE` transactions.
    ///
    /// # Errors
    ///
    /// Returns an error if the database URL is unset, unreachable, or the
    /// migrations fail.
    pub async fn new() -> Result<Self, SetupError> {
        Self::with_isolation(IsolationLevel::Serializable).await
    }

    /// Connect with the given isolation level.
    ///
    /// # Errors
    ///
    /// Returns an error if the database URL is unset, unreachable, or the
    /// migrations fail.
    pub async fn with_isolation(isolation: IsolationLevel) -> Result<Self, SetupError> {
        let database_url: SecretString = CheckoutConfig::database_url_from_env()?;
        let pool = create_pool(&database_url, 10).await?;
        sqlx::migrate!("../checkout/migrations").run(&pool).await?;

        let store = PgStore::new(pool.clone(), isolation);
        let policy = TransactionPolicy {
            isolation,
            ..TransactionPolicy::default()
        };
        let checkout = Checkout::new(store.clone(), policy, test_encryption());
        Ok(Self {
            pool,
            store,
            checkout,
        })
    }

    /// Create a product with a unique name.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError` if the insert fails.
    pub async fn product(&self, price: &str, stock: i32) -> Result<Product, CheckoutError> {
        let price: Price = price
            .parse()
            .map_err(|e| CheckoutError::InvalidProduct(format!("{e}")))?;
        self.checkout
            .catalog()
            .create_product(&NewProduct {
                name: format!("test-product-{}", rand::rng().random::<u32>()),
                description: None,
                price,
                stock,
                image_url: None,
            })
            .await
    }

    /// Write a cart line directly, skipping the cart service's stock check.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write fails.
    pub async fn put_in_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), StoreError> {
        let mut tx = self.store.begin().await?;
        tx.upsert_cart_line(user_id, product_id, quantity).await?;
        tx.commit().await
    }

    /// Current stock of a product.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::ProductNotFound` if it does not exist.
    pub async fn stock(&self, product_id: ProductId) -> Result<i32, CheckoutError> {
        Ok(self.checkout.catalog().get_product(product_id).await?.stock)
    }
}

/// A user id no other test run will pick.
#[must_use]
pub fn fresh_user() -> UserId {
    UserId::new(rand::rng().random_range(1_000_000..i32::MAX))
}

/// Encryption service with a fixed test key.
#[must_use]
pub fn test_encryption() -> EncryptionService {
    let mut key = [0u8; 32];
    for (i, byte) in key.iter_mut().enumerate() {
        #[allow(clippy::cast_possible_truncation)] // i < 32
        let i = i as u8;
        *byte = i.wrapping_mul(37).wrapping_add(11);
    }
    EncryptionService::new(&EncryptionConfig::from_bytes(key))
}
