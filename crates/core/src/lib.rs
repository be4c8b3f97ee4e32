//! SecureCart Core - Shared domain types.
//!
//! This crate provides the types shared by the checkout library and the CLI:
//! - `checkout` - Order engine, payment recorder and the stores behind them
//! - `cli` - Command-line front end for migrations and store operations
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access. The
//! optional `postgres` feature adds sqlx encode/decode impls so the same
//! types can be bound directly in queries.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, and order statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
