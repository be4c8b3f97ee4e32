//! Checkout error taxonomy.
//!
//! Every failure a caller can see is a [`CheckoutError`]. Each variant
//! belongs to one [`ErrorKind`], which decides how it is reported:
//!
//! | Kind         | Meaning                                   | Client sees        |
//! |--------------|-------------------------------------------|--------------------|
//! | `Validation` | bad input (empty cart, bad quantity)      | precise reason     |
//! | `Conflict`   | lost a race for stock or for the order    | precise reason     |
//! | `NotFound`   | missing, or owned by someone else         | precise reason     |
//! | `Integrity`  | encryption or storage failure             | opaque message     |

use thiserror::Error;

use securecart_core::{OrderId, OrderStatus, ProductId};

use crate::db::StoreError;
use crate::services::crypto::CryptoError;

/// Broad class of a [`CheckoutError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Integrity,
}

/// Errors returned by checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Checkout was requested with nothing in the cart.
    #[error("cart is empty")]
    EmptyCart,

    /// Quantity must be greater than zero.
    #[error("invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: i32 },

    /// The order total does not fit the stored amount.
    #[error("order total is too large at product {product_id}")]
    TotalOverflow { product_id: ProductId },

    /// Product fields failed validation.
    #[error("invalid product: {0}")]
    InvalidProduct(String),

    /// Not enough stock to cover the requested quantity.
    #[error("insufficient stock for product {product_id}")]
    InsufficientStock { product_id: ProductId },

    #[error("product {product_id} not found")]
    ProductNotFound { product_id: ProductId },

    /// Product is referenced by past orders and cannot be deleted.
    #[error("product {product_id} is referenced by existing orders")]
    ProductInUse { product_id: ProductId },

    #[error("product {product_id} is not in the cart")]
    CartLineNotFound { product_id: ProductId },

    /// Order does not exist or belongs to another user.
    #[error("order {order_id} not found")]
    OrderNotFound { order_id: OrderId },

    /// Order is not awaiting payment.
    #[error("order {order_id} cannot be paid (status: {status})")]
    OrderNotPayable { order_id: OrderId, status: OrderStatus },

    /// Payment record does not exist or belongs to another user.
    #[error("payment not found")]
    PaymentNotFound,

    /// The transaction kept losing serialization races.
    #[error("checkout is contended, try again")]
    Contention,

    /// Card data could not be encrypted or decrypted.
    #[error("encryption failed: {0}")]
    EncryptionFailed(#[source] CryptoError),

    /// A transaction attempt ran past its deadline and was rolled back.
    #[error("transaction timed out")]
    Timeout,

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl CheckoutError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyCart
            | Self::InvalidQuantity { .. }
            | Self::TotalOverflow { .. }
            | Self::InvalidProduct(_) => ErrorKind::Validation,
            Self::InsufficientStock { .. }
            | Self::ProductInUse { .. }
            | Self::OrderNotPayable { .. }
            | Self::Contention
            | Self::Timeout
            | Self::Storage(StoreError::Conflict) => ErrorKind::Conflict,
            Self::ProductNotFound { .. }
            | Self::CartLineNotFound { .. }
            | Self::OrderNotFound { .. }
            | Self::PaymentNotFound => ErrorKind::NotFound,
            Self::EncryptionFailed(_) | Self::Storage(_) => ErrorKind::Integrity,
        }
    }

    /// Whether a fresh transaction might succeed.
    ///
    /// Only raw serialization conflicts qualify. `Contention` is what a
    /// conflict becomes once the retry has already been spent.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(StoreError::Conflict))
    }

    /// Message safe to show to an end user.
    ///
    /// Integrity failures are reported without detail; the full error is
    /// only logged.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self.kind() {
            ErrorKind::Integrity => "internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<CryptoError> for CheckoutError {
    fn from(err: CryptoError) -> Self {
        Self::EncryptionFailed(err)
    }
}

/// Result type alias for `CheckoutError`.
pub type Result<T> = std::result::Result<T, CheckoutError>;
