//! Shared fixtures for checkout tests.

#![allow(dead_code)]

use std::time::Duration;

use secrecy::SecretString;

use securecart_checkout::models::{CardDetails, NewProduct, Product};
use securecart_checkout::{
    Checkout, CheckoutStore, EncryptionConfig, EncryptionService, MemoryStore, StoreTx,
    TransactionPolicy,
};
use securecart_core::{Price, ProductId, UserId};

pub const ALICE: UserId = UserId::new(1);
pub const BOB: UserId = UserId::new(2);

/// Encryption service with a fixed, non-trivial test key.
pub fn encryption() -> EncryptionService {
    let mut key = [0u8; 32];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = u8::try_from(i * 7 + 3).expect("small index");
    }
    EncryptionService::new(&EncryptionConfig::from_bytes(key))
}

pub fn policy(timeout: Duration) -> TransactionPolicy {
    TransactionPolicy {
        timeout,
        ..TransactionPolicy::default()
    }
}

/// Services over `store` with the default policy.
pub fn checkout(store: &MemoryStore) -> Checkout<MemoryStore> {
    Checkout::new(store.clone(), TransactionPolicy::default(), encryption())
}

pub fn price(amount: &str) -> Price {
    amount.parse().expect("valid price")
}

pub async fn add_product(
    checkout: &Checkout<MemoryStore>,
    name: &str,
    amount: &str,
    stock: i32,
) -> Product {
    checkout
        .catalog()
        .create_product(&NewProduct {
            name: name.to_string(),
            description: Some(format!("{name} description")),
            price: price(amount),
            stock,
            image_url: None,
        })
        .await
        .expect("create product")
}

/// Write a cart line directly, skipping the cart service's stock check.
pub async fn put_in_cart(store: &MemoryStore, user_id: UserId, product_id: ProductId, quantity: i32) {
    let mut tx = store.begin().await.expect("begin");
    tx.upsert_cart_line(user_id, product_id, quantity)
        .await
        .expect("upsert cart line");
    tx.commit().await.expect("commit");
}

pub async fn stock_of(checkout: &Checkout<MemoryStore>, product_id: ProductId) -> i32 {
    checkout
        .catalog()
        .get_product(product_id)
        .await
        .expect("product exists")
        .stock
}

pub async fn cart_len(checkout: &Checkout<MemoryStore>, user_id: UserId) -> usize {
    checkout.cart().get_cart(user_id).await.expect("cart").len()
}

pub async fn order_count(checkout: &Checkout<MemoryStore>, user_id: UserId) -> usize {
    checkout.orders().list_orders(user_id).await.expect("orders").len()
}

pub fn card() -> CardDetails {
    CardDetails {
        card_number: SecretString::from("4111111111111111"),
        card_holder: "Ada Lovelace".to_string(),
        expiry_date: "12/30".to_string(),
        cvv: SecretString::from("737"),
    }
}
