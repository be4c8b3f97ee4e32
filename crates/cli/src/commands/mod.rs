//! CLI command implementations.

pub mod migrate;
pub mod seed;

use std::io::Write;

use serde::Serialize;

use securecart_checkout::{Checkout, CheckoutConfig, PgStore};

/// Load configuration and connect the checkout services to `PostgreSQL`.
///
/// # Errors
///
/// Returns an error if configuration is missing or invalid, or the database
/// is unreachable.
pub async fn connect() -> Result<Checkout<PgStore>, Box<dyn std::error::Error>> {
    let config = CheckoutConfig::from_env()?;
    let checkout = Checkout::connect(&config).await?;
    tracing::debug!(
        isolation = ?config.transaction.isolation,
        timeout = ?config.transaction.timeout,
        "Connected to checkout database"
    );
    Ok(checkout)
}

/// Write `value` to stdout as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
