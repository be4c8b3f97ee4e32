//! Business logic services for checkout.
//!
//! # Services
//!
//! - `orders` - Turn a cart into an order (`OrderEngine`)
//! - `payment` - Record card payments against orders (`PaymentRecorder`)
//! - `catalog` - Product administration (`CatalogService`)
//! - `cart` - Cart line management (`CartService`)
//! - `crypto` - Card data encryption (`EncryptionService`)
//!
//! Every operation runs in its own store transaction through
//! [`run_transaction`], which bounds each attempt by the configured timeout
//! and retries a serialization conflict exactly once.

pub mod cart;
pub mod catalog;
pub mod crypto;
pub mod orders;
pub mod payment;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use crypto::{CryptoError, EncryptionService};
pub use orders::OrderEngine;
pub use payment::PaymentRecorder;

use std::future::Future;

use tracing::warn;

use crate::config::TransactionPolicy;
use crate::db::CheckoutStore;
use crate::error::{CheckoutError, Result};

/// Attempts per operation: the first try plus one retry after a conflict.
pub const MAX_ATTEMPTS: u32 = 2;

/// Run `body` in a fresh transaction, retrying once on a serialization conflict.
///
/// `body` receives the open transaction and must commit it before returning
/// `Ok`. Any error, and any attempt that outlives `policy.timeout`, drops the
/// transaction, which rolls it back.
///
/// # Errors
///
/// Returns whatever `body` fails with, `CheckoutError::Contention` if the
/// retry also conflicts, or `CheckoutError::Timeout` if an attempt runs out
/// of time.
pub async fn run_transaction<S, T, F, Fut>(
    store: &S,
    policy: &TransactionPolicy,
    mut body: F,
) -> Result<T>
where
    S: CheckoutStore,
    F: FnMut(S::Tx) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        let outcome = tokio::time::timeout(policy.timeout, async {
            let tx = store.begin().await?;
            body(tx).await
        })
        .await;

        match outcome {
            Err(_) => {
                warn!(attempt, timeout = ?policy.timeout, "transaction timed out and was rolled back");
                return Err(CheckoutError::Timeout);
            }
            Ok(Err(err)) if err.is_retryable() => {
                if attempt >= MAX_ATTEMPTS {
                    warn!(attempt, "transaction conflicted again, giving up");
                    return Err(CheckoutError::Contention);
                }
                warn!(attempt, "transaction conflict, retrying with a fresh transaction");
                attempt += 1;
            }
            Ok(result) => return result,
        }
    }
}
