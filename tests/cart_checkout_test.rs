mod common;

use assert_matches::assert_matches;
use common::TestApp;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use storefront_api::{
    entities::{cart_item, ordered_product, CartItem, OrderedProduct, OrderStatus, ProductStatus},
    errors::ServiceError,
};

async fn cart_row_count(app: &TestApp, customer_id: uuid::Uuid) -> u64 {
    CartItem::find()
        .filter(cart_item::Column::CustomerId.eq(customer_id))
        .count(&*app.state.db)
        .await
        .expect("failed to count cart rows")
}

#[tokio::test]
async fn add_to_cart_merges_repeat_adds() {
    let app = TestApp::new().await;
    let customer_id = app.seed_customer("Alice", "alice@example.com").await;
    let product_id = app
        .seed_product("Americano", 1000, ProductStatus::Active)
        .await;

    let cart = &app.state.services.cart;
    cart.add_to_cart(customer_id, product_id, 1)
        .await
        .expect("first add failed");
    let item = cart
        .add_to_cart(customer_id, product_id, 2)
        .await
        .expect("second add failed");

    assert_eq!(item.quantity, 3);
    assert_eq!(cart_row_count(&app, customer_id).await, 1);
}

#[tokio::test]
async fn non_active_products_cannot_be_added() {
    let app = TestApp::new().await;
    let customer_id = app.seed_customer("Alice", "alice@example.com").await;
    let product_id = app
        .seed_product("Out of stock", 1000, ProductStatus::SoldOut)
        .await;

    let result = app
        .state
        .services
        .cart
        .add_to_cart(customer_id, product_id, 1)
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn cart_amount_tracks_current_product_price() {
    let app = TestApp::new().await;
    let customer_id = app.seed_customer("Alice", "alice@example.com").await;
    let product_id = app
        .seed_product("Americano", 1000, ProductStatus::Active)
        .await;

    app.state
        .services
        .cart
        .add_to_cart(customer_id, product_id, 2)
        .await
        .expect("add failed");

    app.state
        .services
        .catalog
        .update_price(product_id, 1500)
        .await
        .expect("price update failed");

    let lines = app
        .state
        .services
        .cart
        .cart_detail(customer_id)
        .await
        .expect("cart detail failed");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].amount, 3000);
}

#[tokio::test]
async fn quantity_zero_removes_the_row() {
    let app = TestApp::new().await;
    let customer_id = app.seed_customer("Alice", "alice@example.com").await;
    let product_id = app
        .seed_product("Americano", 1000, ProductStatus::Active)
        .await;

    let cart = &app.state.services.cart;
    cart.add_to_cart(customer_id, product_id, 2)
        .await
        .expect("add failed");

    let updated = cart
        .update_quantity(customer_id, product_id, 0)
        .await
        .expect("update failed");
    assert!(updated.is_none());
    assert_eq!(cart_row_count(&app, customer_id).await, 0);
}

#[tokio::test]
async fn checkout_freezes_cart_into_order() {
    let app = TestApp::new().await;
    let customer_id = app.seed_customer("Alice", "alice@example.com").await;
    let product_a = app
        .seed_product("Product A", 1000, ProductStatus::Active)
        .await;
    let product_b = app
        .seed_product("Product B", 500, ProductStatus::Active)
        .await;

    let cart = &app.state.services.cart;
    cart.add_to_cart(customer_id, product_a, 2)
        .await
        .expect("add A failed");
    cart.add_to_cart(customer_id, product_b, 1)
        .await
        .expect("add B failed");

    let order = app
        .state
        .services
        .orders
        .checkout(customer_id)
        .await
        .expect("checkout failed");

    assert_eq!(order.total_amount, 2500);
    assert_eq!(order.status, OrderStatus::Requested);
    assert!(order.can_pay());

    let snapshots = app
        .state
        .services
        .orders
        .ordered_products(order.id)
        .await
        .expect("snapshot fetch failed");
    assert_eq!(snapshots.len(), 2);

    let mut prices: Vec<(String, i64, i32)> = snapshots
        .iter()
        .map(|s| (s.name.clone(), s.price, s.quantity))
        .collect();
    prices.sort();
    assert_eq!(
        prices,
        vec![
            ("Product A".to_string(), 1000, 2),
            ("Product B".to_string(), 500, 1),
        ]
    );

    // Checkout clears the cart atomically with the order creation.
    assert_eq!(cart_row_count(&app, customer_id).await, 0);
}

#[tokio::test]
async fn checkout_with_empty_cart_is_rejected() {
    let app = TestApp::new().await;
    let customer_id = app.seed_customer("Alice", "alice@example.com").await;

    let result = app.state.services.orders.checkout(customer_id).await;
    assert_matches!(result, Err(ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn create_from_cart_leaves_cart_rows_alone() {
    let app = TestApp::new().await;
    let customer_id = app.seed_customer("Alice", "alice@example.com").await;
    let product_id = app
        .seed_product("Americano", 1000, ProductStatus::Active)
        .await;

    app.state
        .services
        .cart
        .add_to_cart(customer_id, product_id, 1)
        .await
        .expect("add failed");

    let items = CartItem::find()
        .filter(cart_item::Column::CustomerId.eq(customer_id))
        .all(&*app.state.db)
        .await
        .expect("cart fetch failed");

    let order = app
        .state
        .services
        .orders
        .create_from_cart(customer_id, items)
        .await
        .expect("create_from_cart failed");
    assert_eq!(order.total_amount, 1000);

    // Deleting the source cart rows is the caller's half of the checkout
    // transaction.
    assert_eq!(cart_row_count(&app, customer_id).await, 1);
}

#[tokio::test]
async fn price_changes_never_touch_past_orders() {
    let app = TestApp::new().await;
    let customer_id = app.seed_customer("Alice", "alice@example.com").await;
    let product_id = app
        .seed_product("Americano", 1000, ProductStatus::Active)
        .await;

    app.state
        .services
        .cart
        .add_to_cart(customer_id, product_id, 2)
        .await
        .expect("add failed");
    let order = app
        .state
        .services
        .orders
        .checkout(customer_id)
        .await
        .expect("checkout failed");

    app.state
        .services
        .catalog
        .update_price(product_id, 9999)
        .await
        .expect("price update failed");

    let reloaded = app
        .state
        .services
        .orders
        .get_order(order.id)
        .await
        .expect("order fetch failed");
    assert_eq!(reloaded.total_amount, 2000);

    let snapshots = OrderedProduct::find()
        .filter(ordered_product::Column::OrderId.eq(order.id))
        .all(&*app.state.db)
        .await
        .expect("snapshot fetch failed");
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].price, 1000);
    assert_eq!(snapshots[0].quantity, 2);
}

#[tokio::test]
async fn order_display_name_comes_from_snapshots() {
    let app = TestApp::new().await;
    let customer_id = app.seed_customer("Alice", "alice@example.com").await;
    let product_a = app
        .seed_product("Product A", 1000, ProductStatus::Active)
        .await;
    let product_b = app
        .seed_product("Product B", 500, ProductStatus::Active)
        .await;

    let cart = &app.state.services.cart;
    cart.add_to_cart(customer_id, product_a, 1)
        .await
        .expect("add A failed");
    cart.add_to_cart(customer_id, product_b, 1)
        .await
        .expect("add B failed");

    let order = app
        .state
        .services
        .orders
        .checkout(customer_id)
        .await
        .expect("checkout failed");

    let name = app
        .state
        .services
        .orders
        .order_display_name(order.id)
        .await
        .expect("display name failed");
    assert_eq!(name, "Product A and 1 more");
}
