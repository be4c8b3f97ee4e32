//! Cart and catalog tests against the in-memory store.

mod common;

use securecart_checkout::models::NewProduct;
use securecart_checkout::{CheckoutError, MemoryStore};
use securecart_core::ProductId;

use common::{ALICE, BOB, add_product, cart_len, checkout, price, stock_of};

// =============================================================================
// Cart
// =============================================================================

#[tokio::test]
async fn test_add_merges_existing_line() {
    let store = MemoryStore::new();
    let shop = checkout(&store);
    let a = add_product(&shop, "Mug", "8.00", 5).await;

    shop.cart().add_item(ALICE, a.id, 2).await.expect("first add");
    let line = shop.cart().add_item(ALICE, a.id, 3).await.expect("second add");

    assert_eq!(line.quantity, 5);
    let cart = shop.cart().get_cart(ALICE).await.expect("cart");
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].name, "Mug");
    assert_eq!(cart[0].line_total(), Some(price("40.00")));
}

#[tokio::test]
async fn test_add_rejects_merged_quantity_over_stock() {
    let store = MemoryStore::new();
    let shop = checkout(&store);
    let a = add_product(&shop, "Mug", "8.00", 3).await;
    shop.cart().add_item(ALICE, a.id, 2).await.expect("add");

    let err = shop.cart().add_item(ALICE, a.id, 2).await.unwrap_err();

    assert!(matches!(err, CheckoutError::InsufficientStock { product_id } if product_id == a.id));
    let cart = shop.cart().get_cart(ALICE).await.expect("cart");
    assert_eq!(cart[0].quantity, 2);
}

#[tokio::test]
async fn test_add_rejects_bad_input() {
    let store = MemoryStore::new();
    let shop = checkout(&store);
    let a = add_product(&shop, "Mug", "8.00", 3).await;

    let zero = shop.cart().add_item(ALICE, a.id, 0).await.unwrap_err();
    assert!(matches!(zero, CheckoutError::InvalidQuantity { quantity: 0, .. }));

    let negative = shop.cart().add_item(ALICE, a.id, -4).await.unwrap_err();
    assert!(matches!(negative, CheckoutError::InvalidQuantity { quantity: -4, .. }));

    let missing = shop.cart().add_item(ALICE, ProductId::new(404), 1).await.unwrap_err();
    assert!(matches!(missing, CheckoutError::ProductNotFound { .. }));

    assert_eq!(cart_len(&shop, ALICE).await, 0);
}

#[tokio::test]
async fn test_update_quantity() {
    let store = MemoryStore::new();
    let shop = checkout(&store);
    let a = add_product(&shop, "Mug", "8.00", 4).await;
    shop.cart().add_item(ALICE, a.id, 1).await.expect("add");

    let line = shop.cart().update_quantity(ALICE, a.id, 4).await.expect("update");
    assert_eq!(line.quantity, 4);

    let over = shop.cart().update_quantity(ALICE, a.id, 5).await.unwrap_err();
    assert!(matches!(over, CheckoutError::InsufficientStock { .. }));

    let absent = shop.cart().update_quantity(BOB, a.id, 1).await.unwrap_err();
    assert!(matches!(absent, CheckoutError::CartLineNotFound { .. }));
}

#[tokio::test]
async fn test_remove_and_clear() {
    let store = MemoryStore::new();
    let shop = checkout(&store);
    let a = add_product(&shop, "Mug", "8.00", 4).await;
    let b = add_product(&shop, "Plate", "12.00", 4).await;
    let c = add_product(&shop, "Bowl", "9.00", 4).await;
    for product in [&a, &b, &c] {
        shop.cart().add_item(ALICE, product.id, 1).await.expect("add");
    }
    shop.cart().add_item(BOB, a.id, 1).await.expect("add");

    shop.cart().remove_item(ALICE, b.id).await.expect("remove");
    let again = shop.cart().remove_item(ALICE, b.id).await.unwrap_err();
    assert!(matches!(again, CheckoutError::CartLineNotFound { .. }));
    assert_eq!(cart_len(&shop, ALICE).await, 2);

    assert_eq!(shop.cart().clear(ALICE).await.expect("clear"), 2);
    assert_eq!(shop.cart().clear(ALICE).await.expect("clear empty"), 0);
    assert_eq!(cart_len(&shop, ALICE).await, 0);
    assert_eq!(cart_len(&shop, BOB).await, 1);
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_create_and_list_products() {
    let store = MemoryStore::new();
    let shop = checkout(&store);
    let first = add_product(&shop, "Mug", "8.00", 4).await;
    let second = add_product(&shop, "Plate", "12.00", 0).await;

    let products = shop.catalog().list_products().await.expect("list");
    let ids: Vec<ProductId> = products.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);

    let fetched = shop.catalog().get_product(second.id).await.expect("get");
    assert_eq!(fetched.price, price("12.00"));
    assert_eq!(fetched.stock, 0);
}

#[tokio::test]
async fn test_create_rejects_invalid_product() {
    let store = MemoryStore::new();
    let shop = checkout(&store);

    let err = shop
        .catalog()
        .create_product(&NewProduct {
            name: "  ".to_string(),
            description: None,
            price: price("1.00"),
            stock: 1,
            image_url: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::InvalidProduct(_)));
    assert!(shop.catalog().list_products().await.expect("list").is_empty());
}

#[tokio::test]
async fn test_sub_cent_price_is_rejected_before_it_reaches_an_order() {
    let store = MemoryStore::new();
    let shop = checkout(&store);
    let fractional = NewProduct {
        name: "Fractional".to_string(),
        description: None,
        price: price("10.005"),
        stock: 2,
        image_url: None,
    };

    let err = shop.catalog().create_product(&fractional).await.unwrap_err();
    assert!(matches!(err, CheckoutError::InvalidProduct(_)));
    assert!(shop.catalog().list_products().await.expect("list").is_empty());

    let existing = add_product(&shop, "Whole cents", "10.00", 2).await;
    let err = shop
        .catalog()
        .update_product(existing.id, &fractional)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::InvalidProduct(_)));
    assert_eq!(
        shop.catalog().get_product(existing.id).await.expect("get").price,
        price("10.00")
    );
}

fn sample(name: &str, amount: &str) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        description: None,
        price: price(amount),
        stock: 3,
        image_url: None,
    }
}

#[tokio::test]
async fn test_create_products_inserts_all_in_order() {
    let store = MemoryStore::new();
    let shop = checkout(&store);

    let created = shop
        .catalog()
        .create_products(&[sample("Mug", "8.00"), sample("Plate", "12.00")])
        .await
        .expect("create");

    let names: Vec<&str> = created.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Mug", "Plate"]);
    assert_eq!(shop.catalog().list_products().await.expect("list").len(), 2);
}

#[tokio::test]
async fn test_create_products_is_all_or_nothing() {
    let store = MemoryStore::new();
    let shop = checkout(&store);

    let err = shop
        .catalog()
        .create_products(&[sample("Mug", "8.00"), sample("Plate", "12.005")])
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::InvalidProduct(_)));
    assert!(shop.catalog().list_products().await.expect("list").is_empty());

    // both attempts lose at commit
    store.inject_commit_conflicts(2).expect("inject");
    let err = shop
        .catalog()
        .create_products(&[sample("Mug", "8.00"), sample("Plate", "12.00")])
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Contention));
    assert!(shop.catalog().list_products().await.expect("list").is_empty());
}

#[tokio::test]
async fn test_update_missing_product() {
    let store = MemoryStore::new();
    let shop = checkout(&store);
    let err = shop
        .catalog()
        .update_product(
            ProductId::new(77),
            &NewProduct {
                name: "Ghost".to_string(),
                description: None,
                price: price("1.00"),
                stock: 1,
                image_url: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::ProductNotFound { .. }));
}

#[tokio::test]
async fn test_delete_product_drops_cart_lines() {
    let store = MemoryStore::new();
    let shop = checkout(&store);
    let a = add_product(&shop, "Mug", "8.00", 4).await;
    shop.cart().add_item(ALICE, a.id, 1).await.expect("add");
    shop.cart().add_item(BOB, a.id, 2).await.expect("add");

    shop.catalog().delete_product(a.id).await.expect("delete");

    assert_eq!(cart_len(&shop, ALICE).await, 0);
    assert_eq!(cart_len(&shop, BOB).await, 0);
    let again = shop.catalog().delete_product(a.id).await.unwrap_err();
    assert!(matches!(again, CheckoutError::ProductNotFound { .. }));
}

#[tokio::test]
async fn test_delete_product_in_use_is_refused() {
    let store = MemoryStore::new();
    let shop = checkout(&store);
    let a = add_product(&shop, "Mug", "8.00", 4).await;
    shop.cart().add_item(ALICE, a.id, 1).await.expect("add");
    shop.orders().create_order(ALICE).await.expect("checkout");

    let err = shop.catalog().delete_product(a.id).await.unwrap_err();

    assert!(matches!(err, CheckoutError::ProductInUse { product_id } if product_id == a.id));
    assert_eq!(stock_of(&shop, a.id).await, 3);
}
