//! Thin HTTP surface over the services. All business rules live in the
//! service layer; handlers translate between HTTP and service calls.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::{
    entities::{cart_item, customer, order, product},
    errors::ServiceError,
    services::{
        cart::CartLine,
        catalog::{CreateProductInput, ProductListPage},
        customers::CreateCustomerInput,
        payments::PaymentInitiation,
        CartService, CatalogService, CustomerService, OrderService, PaymentService,
    },
    AppState,
};

/// Service bundle carried inside the application state.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: CatalogService,
    pub customers: CustomerService,
    pub cart: CartService,
    pub orders: OrderService,
    pub payments: PaymentService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/categories", post(create_category))
        .route("/products", get(list_products).post(create_product))
        .route("/products/:product_id", get(product_detail))
        .route(
            "/products/:product_id/status",
            axum::routing::put(update_product_status),
        )
        .route("/customers", post(create_customer))
        .route("/customers/:customer_id/cart", get(cart_detail))
        .route(
            "/customers/:customer_id/cart/items",
            post(add_to_cart),
        )
        .route(
            "/customers/:customer_id/cart/items/:product_id",
            axum::routing::put(update_cart_quantity).delete(remove_cart_item),
        )
        .route(
            "/customers/:customer_id/orders",
            get(list_paid_orders).post(checkout),
        )
        .route("/customers/:customer_id/orders/:order_id", get(order_detail))
        .route(
            "/customers/:customer_id/orders/:order_id/payments",
            post(start_payment),
        )
        .route(
            "/orders/:order_id/payments/:attempt_id/confirm",
            get(confirm_payment),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct CreateCategoryRequest {
    name: String,
}

async fn create_category(
    State(state): State<AppState>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<crate::entities::category::Model>), ServiceError> {
    let category = state.services.catalog.create_category(&req.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<CreateProductInput>,
) -> Result<(StatusCode, Json<product::Model>), ServiceError> {
    let product = state.services.catalog.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Storefront product view: anything that cannot currently be purchased
/// reads as absent.
async fn product_detail(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<product::Model>, ServiceError> {
    let product = state
        .services
        .catalog
        .get_purchasable_product(product_id)
        .await?;
    Ok(Json(product))
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: product::ProductStatus,
}

async fn update_product_status(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<product::Model>, ServiceError> {
    let product = state
        .services
        .catalog
        .update_status(product_id, req.status)
        .await?;
    Ok(Json(product))
}

#[derive(Debug, Deserialize)]
struct ListProductsQuery {
    query: Option<String>,
    #[serde(default = "default_page")]
    page: u64,
    #[serde(default = "default_per_page")]
    per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListProductsQuery>,
) -> Result<Json<ProductListPage>, ServiceError> {
    let page = state
        .services
        .catalog
        .list_products(params.query, params.page, params.per_page)
        .await?;
    Ok(Json(page))
}

async fn create_customer(
    State(state): State<AppState>,
    Json(input): Json<CreateCustomerInput>,
) -> Result<(StatusCode, Json<customer::Model>), ServiceError> {
    let customer = state.services.customers.create_customer(input).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

#[derive(Debug, Serialize)]
struct CartDetailResponse {
    lines: Vec<CartLine>,
    total_amount: i64,
}

async fn cart_detail(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<CartDetailResponse>, ServiceError> {
    let lines = state.services.cart.cart_detail(customer_id).await?;
    let total_amount = lines.iter().map(|line| line.amount).sum();
    Ok(Json(CartDetailResponse {
        lines,
        total_amount,
    }))
}

#[derive(Debug, Deserialize)]
struct AddToCartRequest {
    product_id: Uuid,
    #[serde(default = "default_quantity")]
    quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

async fn add_to_cart(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<cart_item::Model>), ServiceError> {
    let item = state
        .services
        .cart
        .add_to_cart(customer_id, req.product_id, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[derive(Debug, Deserialize)]
struct UpdateQuantityRequest {
    quantity: i32,
}

async fn update_cart_quantity(
    State(state): State<AppState>,
    Path((customer_id, product_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<Option<cart_item::Model>>, ServiceError> {
    let item = state
        .services
        .cart
        .update_quantity(customer_id, product_id, req.quantity)
        .await?;
    Ok(Json(item))
}

async fn remove_cart_item(
    State(state): State<AppState>,
    Path((customer_id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ServiceError> {
    state
        .services
        .cart
        .remove_item(customer_id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn checkout(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<(StatusCode, Json<order::Model>), ServiceError> {
    let order = state.services.orders.checkout(customer_id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_paid_orders(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Vec<order::Model>>, ServiceError> {
    let orders = state.services.orders.list_paid_orders(customer_id).await?;
    Ok(Json(orders))
}

#[derive(Debug, Serialize)]
struct OrderDetailResponse {
    order: order::Model,
    display_name: String,
    items: Vec<crate::entities::ordered_product::Model>,
}

async fn order_detail(
    State(state): State<AppState>,
    Path((customer_id, order_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<OrderDetailResponse>, ServiceError> {
    let order = state
        .services
        .orders
        .get_order_for_customer(order_id, customer_id)
        .await?;
    let items = state.services.orders.ordered_products(order_id).await?;
    let display_name = crate::services::orders::display_name(&items);
    Ok(Json(OrderDetailResponse {
        order,
        display_name,
        items,
    }))
}

/// Payment initiation: gate on the order's payable state, then mint a fresh
/// attempt and hand back the widget payload.
async fn start_payment(
    State(state): State<AppState>,
    Path((customer_id, order_id)): Path<(Uuid, Uuid)>,
) -> Result<(StatusCode, Json<PaymentInitiation>), ServiceError> {
    let order = state
        .services
        .orders
        .get_order_for_customer(order_id, customer_id)
        .await?;
    if !order.can_pay() {
        return Err(ServiceError::InvalidOperation(
            "This order cannot be paid in its current state".to_string(),
        ));
    }

    let attempt = state
        .services
        .payments
        .create_attempt_for_order(order.id)
        .await?;
    let initiation = state.services.payments.payment_initiation(&attempt);
    Ok((StatusCode::CREATED, Json(initiation)))
}

#[derive(Debug, Serialize)]
struct ConfirmResponse {
    order_status: String,
    pay_status: String,
    is_paid_ok: bool,
}

/// Confirmation callback target: the gateway redirects the buyer's browser
/// here, we pull the authoritative state and expose the resulting order
/// status. Safe to hit repeatedly.
async fn confirm_payment(
    State(state): State<AppState>,
    Path((order_id, attempt_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ConfirmResponse>, ServiceError> {
    let outcome = state.services.payments.confirm(order_id, attempt_id).await?;
    let order = outcome.order.ok_or_else(|| {
        ServiceError::InternalError("order-bound reconcile returned no order".to_string())
    })?;
    Ok(Json(ConfirmResponse {
        order_status: order.status.to_string(),
        pay_status: outcome.attempt.pay_status.to_string(),
        is_paid_ok: outcome.attempt.is_paid_ok,
    }))
}
