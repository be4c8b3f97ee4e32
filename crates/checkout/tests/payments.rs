//! Payment recorder tests against the in-memory store.

mod common;

use securecart_checkout::models::OrderWithLines;
use securecart_checkout::{Checkout, CheckoutError, CheckoutStore, MemoryStore, StoreTx};
use securecart_core::{OrderId, OrderStatus, PaymentId};

use common::{ALICE, BOB, add_product, card, checkout, encryption};

/// Place a one-line order for `ALICE`.
async fn placed_order(shop: &Checkout<MemoryStore>) -> OrderWithLines {
    let a = add_product(shop, "Headphones", "59.00", 3).await;
    shop.cart().add_item(ALICE, a.id, 1).await.expect("add");
    shop.orders().create_order(ALICE).await.expect("checkout")
}

#[tokio::test]
async fn test_payment_marks_order_paid() {
    let store = MemoryStore::new();
    let shop = checkout(&store);
    let order = placed_order(&shop).await;

    let receipt = shop
        .payments()
        .process_payment(ALICE, order.order.id, &card())
        .await
        .expect("payment");

    assert_eq!(receipt.status, OrderStatus::Paid);
    assert_eq!(receipt.order_id, order.order.id);

    let stored = shop
        .orders()
        .get_order(ALICE, order.order.id)
        .await
        .expect("order");
    assert_eq!(stored.order.status, OrderStatus::Paid);
    assert_eq!(stored.order.payment_id, Some(receipt.payment_id));
    assert_eq!(stored.order.total_price, order.order.total_price);
}

#[tokio::test]
async fn test_card_data_is_stored_encrypted() {
    let store = MemoryStore::new();
    let shop = checkout(&store);
    let order = placed_order(&shop).await;
    let receipt = shop
        .payments()
        .process_payment(ALICE, order.order.id, &card())
        .await
        .expect("payment");

    let mut tx = store.begin().await.expect("begin");
    let record = tx
        .payment_for_user(receipt.payment_id, ALICE)
        .await
        .expect("read")
        .expect("payment exists");
    tx.rollback().await.expect("rollback");

    let stored_number = record.card_number.expect("card number stored");
    let stored_cvv = record.cvv.expect("cvv stored");
    assert!(!stored_number.contains("4111111111111111"));
    assert_ne!(stored_cvv, "737");
    assert_eq!(record.card_holder, "Ada Lovelace");
    assert_eq!(record.expiry_date, "12/30");

    let crypto = encryption();
    assert_eq!(
        crypto.decrypt(Some(&stored_number)).expect("decrypt").as_deref(),
        Some("4111111111111111")
    );
    assert_eq!(crypto.decrypt(Some(&stored_cvv)).expect("decrypt").as_deref(), Some("737"));
}

#[tokio::test]
async fn test_card_on_file_is_masked() {
    let store = MemoryStore::new();
    let shop = checkout(&store);
    let order = placed_order(&shop).await;
    let receipt = shop
        .payments()
        .process_payment(ALICE, order.order.id, &card())
        .await
        .expect("payment");

    let masked = shop
        .payments()
        .card_on_file(ALICE, receipt.payment_id)
        .await
        .expect("card on file");
    assert_eq!(masked.card_number.as_deref(), Some("************1111"));
    assert_eq!(masked.card_holder, "Ada Lovelace");

    let foreign = shop.payments().card_on_file(BOB, receipt.payment_id).await.unwrap_err();
    assert!(matches!(foreign, CheckoutError::PaymentNotFound));
}

#[tokio::test]
async fn test_payment_on_foreign_order_writes_nothing() {
    let store = MemoryStore::new();
    let shop = checkout(&store);
    let order = placed_order(&shop).await;

    let err = shop
        .payments()
        .process_payment(BOB, order.order.id, &card())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::OrderNotFound { order_id } if order_id == order.order.id));
    let stored = shop
        .orders()
        .get_order(ALICE, order.order.id)
        .await
        .expect("order");
    assert_eq!(stored.order.status, OrderStatus::Processing);
    assert_eq!(stored.order.payment_id, None);

    let mut tx = store.begin().await.expect("begin");
    for user in [ALICE, BOB] {
        assert!(tx
            .payment_for_user(PaymentId::new(1), user)
            .await
            .expect("read")
            .is_none());
    }
}

#[tokio::test]
async fn test_payment_on_missing_order() {
    let store = MemoryStore::new();
    let shop = checkout(&store);

    let err = shop
        .payments()
        .process_payment(ALICE, OrderId::new(12345), &card())
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::OrderNotFound { .. }));

    let mut tx = store.begin().await.expect("begin");
    assert!(tx
        .payment_for_user(PaymentId::new(1), ALICE)
        .await
        .expect("read")
        .is_none());
    assert!(tx
        .order_for_user(OrderId::new(12345), ALICE)
        .await
        .expect("read")
        .is_none());
}

#[tokio::test]
async fn test_paid_order_cannot_be_paid_again() {
    let store = MemoryStore::new();
    let shop = checkout(&store);
    let order = placed_order(&shop).await;
    let first = shop
        .payments()
        .process_payment(ALICE, order.order.id, &card())
        .await
        .expect("first payment");

    let err = shop
        .payments()
        .process_payment(ALICE, order.order.id, &card())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::OrderNotPayable { status: OrderStatus::Paid, .. }
    ));
    let stored = shop
        .orders()
        .get_order(ALICE, order.order.id)
        .await
        .expect("order");
    assert_eq!(stored.order.payment_id, Some(first.payment_id));
}

#[tokio::test]
async fn test_payment_retries_one_conflict() {
    let store = MemoryStore::new();
    let shop = checkout(&store);
    let order = placed_order(&shop).await;
    store.inject_commit_conflicts(1).expect("inject");

    let receipt = shop
        .payments()
        .process_payment(ALICE, order.order.id, &card())
        .await
        .expect("payment after retry");
    assert_eq!(receipt.status, OrderStatus::Paid);
}

#[tokio::test]
async fn test_order_json_shape() {
    let store = MemoryStore::new();
    let shop = checkout(&store);
    let order = placed_order(&shop).await;

    let json = serde_json::to_value(&order).expect("serialize");
    assert_eq!(json["status"], "processing");
    assert_eq!(json["total_price"], "59.00");
    assert_eq!(json["lines"][0]["quantity"], 1);
    assert_eq!(json["lines"][0]["unit_price"], "59.00");
}
