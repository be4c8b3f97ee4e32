//! Checkout state shared across callers.

use std::sync::Arc;

use crate::config::{CheckoutConfig, TransactionPolicy};
use crate::db::{self, CheckoutStore, PgStore};
use crate::services::{CartService, CatalogService, EncryptionService, OrderEngine, PaymentRecorder};

/// Every checkout service over one store.
///
/// This struct is cheaply cloneable via `Arc`. The store, transaction policy
/// and encryption key are fixed at construction; nothing is global.
#[derive(Clone)]
pub struct Checkout<S> {
    inner: Arc<CheckoutInner<S>>,
}

struct CheckoutInner<S> {
    catalog: CatalogService<S>,
    cart: CartService<S>,
    orders: OrderEngine<S>,
    payments: PaymentRecorder<S>,
}

impl<S: CheckoutStore> Checkout<S> {
    /// Wire the services over `store`.
    #[must_use]
    pub fn new(store: S, policy: TransactionPolicy, crypto: EncryptionService) -> Self {
        Self {
            inner: Arc::new(CheckoutInner {
                catalog: CatalogService::new(store.clone(), policy),
                cart: CartService::new(store.clone(), policy),
                orders: OrderEngine::new(store.clone(), policy),
                payments: PaymentRecorder::new(store, policy, crypto),
            }),
        }
    }

    /// Product administration.
    #[must_use]
    pub fn catalog(&self) -> &CatalogService<S> {
        &self.inner.catalog
    }

    /// Cart management.
    #[must_use]
    pub fn cart(&self) -> &CartService<S> {
        &self.inner.cart
    }

    /// Order creation and lookup.
    #[must_use]
    pub fn orders(&self) -> &OrderEngine<S> {
        &self.inner.orders
    }

    /// Payment recording.
    #[must_use]
    pub fn payments(&self) -> &PaymentRecorder<S> {
        &self.inner.payments
    }
}

impl Checkout<PgStore> {
    /// Connect to `PostgreSQL` and wire the services from configuration.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` if the connection pool cannot be created.
    pub async fn connect(config: &CheckoutConfig) -> Result<Self, sqlx::Error> {
        let pool = db::create_pool(&config.database_url, config.max_connections).await?;
        let store = PgStore::new(pool, config.transaction.isolation);
        Ok(Self::new(
            store,
            config.transaction,
            EncryptionService::new(&config.encryption),
        ))
    }
}
