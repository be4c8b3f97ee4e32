//! Domain models for checkout.
//!
//! Stored rows (`Product`, `CartLine`, `Order`, `OrderLine`, `PaymentRecord`)
//! and the read-only projections built from them (`CartItem`,
//! `OrderLineView`, `OrderWithLines`).

pub mod cart;
pub mod order;
pub mod payment;
pub mod product;

pub use cart::{CartItem, CartLine, CheckoutLine};
pub use order::{NewOrderLine, Order, OrderLine, OrderLineView, OrderWithLines, TOTAL_NUMERIC};
pub use payment::{CardDetails, MaskedCard, NewPaymentRecord, PaymentReceipt, PaymentRecord};
pub use product::{NewProduct, PRICE_NUMERIC, Product};
