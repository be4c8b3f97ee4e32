//! Checkout against a real `PostgreSQL` database.
//!
//! These tests require a running `PostgreSQL` reachable through
//! `CHECKOUT_DATABASE_URL` (or `DATABASE_URL`).
//!
//! Run with: cargo test -p securecart-integration-tests -- --ignored

use securecart_checkout::models::CardDetails;
use securecart_checkout::{CheckoutError, IsolationLevel};
use securecart_core::{OrderStatus, Price};
use securecart_integration_tests::{TestContext, fresh_user, test_encryption};
use secrecy::SecretString;

fn price(amount: &str) -> Price {
    amount.parse().expect("valid price")
}

fn card() -> CardDetails {
    CardDetails {
        card_number: SecretString::from("4000056655665556"),
        card_holder: "Grace Hopper".to_string(),
        expiry_date: "09/29".to_string(),
        cvv: SecretString::from("123"),
    }
}

// ============================================================================
// Order creation
// ============================================================================

#[tokio::test]
#[ignore = "Requires running PostgreSQL (CHECKOUT_DATABASE_URL)"]
async fn test_checkout_decrements_stock_and_clears_cart() {
    let ctx = TestContext::new().await.expect("connect");
    let user = fresh_user();
    let a = ctx.product("10.00", 2).await.expect("product");
    ctx.checkout.cart().add_item(user, a.id, 2).await.expect("add");

    let order = ctx.checkout.orders().create_order(user).await.expect("checkout");

    assert_eq!(order.order.total_price, price("20.00"));
    assert_eq!(order.order.status, OrderStatus::Processing);
    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].unit_price, price("10.00"));
    assert_eq!(ctx.stock(a.id).await.expect("stock"), 0);
    assert!(ctx.checkout.cart().get_cart(user).await.expect("cart").is_empty());
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL (CHECKOUT_DATABASE_URL)"]
async fn test_insufficient_stock_rolls_back() {
    let ctx = TestContext::new().await.expect("connect");
    let user = fresh_user();
    let plenty = ctx.product("3.00", 10).await.expect("product");
    let b = ctx.product("5.00", 1).await.expect("product");
    ctx.put_in_cart(user, plenty.id, 4).await.expect("cart");
    ctx.put_in_cart(user, b.id, 2).await.expect("cart");

    let err = ctx.checkout.orders().create_order(user).await.unwrap_err();

    assert!(matches!(err, CheckoutError::InsufficientStock { product_id } if product_id == b.id));
    assert_eq!(ctx.stock(plenty.id).await.expect("stock"), 10);
    assert_eq!(ctx.stock(b.id).await.expect("stock"), 1);
    assert!(ctx.checkout.orders().list_orders(user).await.expect("orders").is_empty());
    assert_eq!(ctx.checkout.cart().get_cart(user).await.expect("cart").len(), 2);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL (CHECKOUT_DATABASE_URL)"]
async fn test_order_total_matches_stored_lines() {
    let ctx = TestContext::new().await.expect("connect");
    let user = fresh_user();
    let x = ctx.product("19.99", 5).await.expect("product");
    let y = ctx.product("0.01", 500).await.expect("product");
    ctx.put_in_cart(user, x.id, 3).await.expect("cart");
    ctx.put_in_cart(user, y.id, 7).await.expect("cart");

    let order = ctx.checkout.orders().create_order(user).await.expect("checkout");
    let stored = ctx
        .checkout
        .orders()
        .get_order(user, order.order.id)
        .await
        .expect("get");

    assert_eq!(stored.order.total_price, price("60.04"));
    assert_eq!(stored.lines_total(), Some(stored.order.total_price));
}

// ============================================================================
// Concurrency
// ============================================================================

async fn race_for_last_unit(isolation: IsolationLevel) {
    let ctx = TestContext::with_isolation(isolation).await.expect("connect");
    let c = ctx.product("7.50", 1).await.expect("product");
    let first_user = fresh_user();
    let second_user = fresh_user();
    ctx.put_in_cart(first_user, c.id, 1).await.expect("cart");
    ctx.put_in_cart(second_user, c.id, 1).await.expect("cart");

    let (first, second) = tokio::join!(
        ctx.checkout.orders().create_order(first_user),
        ctx.checkout.orders().create_order(second_user)
    );

    let successes = usize::from(first.is_ok()) + usize::from(second.is_ok());
    assert_eq!(successes, 1, "exactly one checkout may win: {first:?} / {second:?}");
    assert_eq!(ctx.stock(c.id).await.expect("stock"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires running PostgreSQL (CHECKOUT_DATABASE_URL)"]
async fn test_race_for_last_unit_serializable() {
    race_for_last_unit(IsolationLevel::Serializable).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires running PostgreSQL (CHECKOUT_DATABASE_URL)"]
async fn test_race_for_last_unit_read_committed() {
    race_for_last_unit(IsolationLevel::ReadCommitted).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires running PostgreSQL (CHECKOUT_DATABASE_URL)"]
async fn test_many_buyers_never_oversell() {
    const BUYERS: usize = 6;
    const STOCK: i32 = 3;

    let ctx = TestContext::new().await.expect("connect");
    let p = ctx.product("1.00", STOCK).await.expect("product");
    let users: Vec<_> = (0..BUYERS).map(|_| fresh_user()).collect();
    for user in &users {
        ctx.put_in_cart(*user, p.id, 1).await.expect("cart");
    }

    let handles: Vec<_> = users
        .iter()
        .map(|user| {
            let checkout = ctx.checkout.clone();
            let user = *user;
            tokio::spawn(async move { checkout.orders().create_order(user).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => successes += 1,
            Err(err) => assert!(
                matches!(
                    err,
                    CheckoutError::InsufficientStock { .. } | CheckoutError::Contention
                ),
                "unexpected error: {err}"
            ),
        }
    }

    let remaining = ctx.stock(p.id).await.expect("stock");
    assert!(remaining >= 0);
    assert_eq!(successes, STOCK - remaining);
}

// ============================================================================
// Payments
// ============================================================================

#[tokio::test]
#[ignore = "Requires running PostgreSQL (CHECKOUT_DATABASE_URL)"]
async fn test_payment_stores_ciphertext_and_marks_paid() {
    let ctx = TestContext::new().await.expect("connect");
    let user = fresh_user();
    let a = ctx.product("42.00", 1).await.expect("product");
    ctx.put_in_cart(user, a.id, 1).await.expect("cart");
    let order = ctx.checkout.orders().create_order(user).await.expect("checkout");

    let receipt = ctx
        .checkout
        .payments()
        .process_payment(user, order.order.id, &card())
        .await
        .expect("payment");
    assert_eq!(receipt.status, OrderStatus::Paid);

    let (number, cvv): (Option<String>, Option<String>) = sqlx::query_as(
        "SELECT card_number, cvv FROM checkout.payment_card WHERE id = $1",
    )
    .bind(receipt.payment_id)
    .fetch_one(&ctx.pool)
    .await
    .expect("payment row");
    let number = number.expect("card number stored");
    let cvv = cvv.expect("cvv stored");
    assert!(!number.contains("4000056655665556"));
    assert_ne!(cvv, "123");

    let crypto = test_encryption();
    assert_eq!(
        crypto.decrypt(Some(&number)).expect("decrypt").as_deref(),
        Some("4000056655665556")
    );

    let stored = ctx
        .checkout
        .orders()
        .get_order(user, order.order.id)
        .await
        .expect("order");
    assert_eq!(stored.order.status, OrderStatus::Paid);
    assert_eq!(stored.order.payment_id, Some(receipt.payment_id));
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL (CHECKOUT_DATABASE_URL)"]
async fn test_payment_on_foreign_order_writes_nothing() {
    let ctx = TestContext::new().await.expect("connect");
    let owner = fresh_user();
    let intruder = fresh_user();
    let a = ctx.product("42.00", 1).await.expect("product");
    ctx.put_in_cart(owner, a.id, 1).await.expect("cart");
    let order = ctx.checkout.orders().create_order(owner).await.expect("checkout");

    let err = ctx
        .checkout
        .payments()
        .process_payment(intruder, order.order.id, &card())
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::OrderNotFound { .. }));

    let payments: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM checkout.payment_card WHERE user_id = $1")
            .bind(intruder)
            .fetch_one(&ctx.pool)
            .await
            .expect("count");
    assert_eq!(payments, 0);

    let stored = ctx
        .checkout
        .orders()
        .get_order(owner, order.order.id)
        .await
        .expect("order");
    assert_eq!(stored.order.status, OrderStatus::Processing);
}
