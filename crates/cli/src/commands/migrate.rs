//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! sc-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `CHECKOUT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Checkout migrations live in `crates/checkout/migrations/` and create the
//! `checkout` schema:
//! ```text
//! migrations/
//! ├── 20260301000001_create_catalog.sql
//! └── 20260301000002_create_orders.sql
//! ```

use tracing::info;

use securecart_checkout::CheckoutConfig;
use securecart_checkout::db::create_pool;

/// Run checkout database migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails, or
/// a migration fails to apply.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = CheckoutConfig::database_url_from_env()?;

    info!("Connecting to checkout database...");
    let pool = create_pool(&database_url, 1).await?;

    info!("Running checkout migrations...");
    sqlx::migrate!("../checkout/migrations").run(&pool).await?;

    info!("Checkout migrations complete!");
    Ok(())
}
