//! SecureCart checkout library.
//!
//! Turns a user's cart into an order and records card payments against
//! orders, with every multi-step operation in one store transaction.
//!
//! # Modules
//!
//! - [`config`] - Environment configuration and transaction policy
//! - [`db`] - Store seam plus the `PostgreSQL` and in-memory stores
//! - [`error`] - `CheckoutError` and its kinds
//! - [`models`] - Rows and read projections
//! - [`services`] - Order engine, payment recorder, catalog, cart, encryption
//! - [`state`] - `Checkout`, the services wired over one store

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;

pub use config::{CheckoutConfig, ConfigError, EncryptionConfig, IsolationLevel, TransactionPolicy};
pub use db::{CheckoutStore, MemoryStore, PgStore, StoreError, StoreTx};
pub use error::{CheckoutError, ErrorKind};
pub use services::{
    CartService, CatalogService, CryptoError, EncryptionService, OrderEngine, PaymentRecorder,
};
pub use state::Checkout;
