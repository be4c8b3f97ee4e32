//! Seed the catalog with sample products.
//!
//! Seeding only runs against an empty catalog, so it is safe to repeat.

use tracing::info;

use securecart_checkout::db::create_pool;
use securecart_checkout::models::NewProduct;
use securecart_checkout::{CatalogService, CheckoutConfig, IsolationLevel, PgStore, TransactionPolicy};
use securecart_core::{Price, PriceError};

/// (name, description, price in cents, stock)
const SAMPLE_PRODUCTS: &[(&str, &str, i64, i32)] = &[
    (
        "Encrypted SSD Drive - 512GB",
        "Self-encrypting solid state drive with AES-256 hardware encryption.",
        14_999,
        15,
    ),
    (
        "Secure Laptop Lock",
        "Steel cable lock with a four-digit combination.",
        3_499,
        28,
    ),
    (
        "Biometric USB Key",
        "Flash drive unlocked by fingerprint.",
        8_999,
        10,
    ),
    (
        "Privacy Screen Protector",
        "Narrow viewing-angle filter for laptop displays.",
        2_999,
        20,
    ),
    (
        "Encrypted Cloud Backup - 1TB",
        "One year of end-to-end encrypted backup storage.",
        12_000,
        100,
    ),
    (
        "Hardware Security Key",
        "FIDO2 key for two-factor sign-in.",
        4_999,
        18,
    ),
    (
        "Secure File Shredder",
        "Cross-cut shredder for paper, discs and cards.",
        7_999,
        8,
    ),
];

/// Insert the sample catalog if no products exist yet.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails, or
/// an insert is rejected.
pub async fn sample_catalog() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = CheckoutConfig::database_url_from_env()?;
    let pool = create_pool(&database_url, 1).await?;
    info!("Connected to database");

    let catalog = CatalogService::new(
        PgStore::new(pool, IsolationLevel::default()),
        TransactionPolicy::default(),
    );

    let existing = catalog.list_products().await?;
    if !existing.is_empty() {
        info!(products = existing.len(), "Catalog already populated, skipping seed");
        return Ok(());
    }

    let products = SAMPLE_PRODUCTS
        .iter()
        .map(|(name, description, cents, stock)| {
            Ok(NewProduct {
                name: (*name).to_string(),
                description: Some((*description).to_string()),
                price: Price::from_cents(*cents)?,
                stock: *stock,
                image_url: None,
            })
        })
        .collect::<Result<Vec<_>, PriceError>>()?;

    // One transaction, so a failed seed leaves the catalog empty and re-runnable
    let created = catalog.create_products(&products).await?;
    for product in &created {
        info!(product_id = %product.id, name = %product.name, "Seeded product");
    }

    info!("Seeding complete! {} products inserted", created.len());
    Ok(())
}
