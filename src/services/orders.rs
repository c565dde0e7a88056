use crate::{
    entities::{
        cart_item, order,
        order::OrderStatus,
        ordered_product, CartItem, Order, OrderedProduct, Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Human-readable order label derived from the frozen snapshot rows, never
/// from live product data.
pub fn display_name(items: &[ordered_product::Model]) -> String {
    match items {
        [] => "no items".to_string(),
        [only] => only.name.clone(),
        [first, rest @ ..] => format!("{} and {} more", first.name, rest.len()),
    }
}

/// Order engine: converts cart snapshots into immutable orders and owns the
/// order status state machine.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Converts the given cart rows into an order plus frozen line-item
    /// snapshots, in one transaction. Prices are read from the products at
    /// call time and copied into the snapshots so that later product edits
    /// never alter historical totals or receipts.
    ///
    /// The source cart rows are NOT deleted here; [`Self::checkout`] wraps
    /// both halves in a single transaction.
    #[instrument(skip(self, items), fields(customer_id = %customer_id, line_count = items.len()))]
    pub async fn create_from_cart(
        &self,
        customer_id: Uuid,
        items: Vec<cart_item::Model>,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let order = self.create_from_cart_in(&txn, customer_id, &items).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order.id))
            .await;
        info!(order_id = %order.id, total_amount = order.total_amount, "Order created from cart");
        Ok(order)
    }

    /// Full checkout: snapshot the customer's cart into an order and delete
    /// the cart rows, atomically. If either half fails neither is
    /// committed, so a cart can never be cleared without its order nor the
    /// other way around.
    #[instrument(skip(self))]
    pub async fn checkout(&self, customer_id: Uuid) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let items = CartItem::find()
            .filter(cart_item::Column::CustomerId.eq(customer_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&txn)
            .await?;

        let order = self.create_from_cart_in(&txn, customer_id, &items).await?;

        CartItem::delete_many()
            .filter(cart_item::Column::CustomerId.eq(customer_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order.id))
            .await;
        self.event_sender
            .send_or_log(Event::CartCleared(customer_id))
            .await;
        info!(order_id = %order.id, customer_id = %customer_id, "Checkout completed");
        Ok(order)
    }

    async fn create_from_cart_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        customer_id: Uuid,
        items: &[cart_item::Model],
    ) -> Result<order::Model, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::InvalidOperation("Cart is empty".to_string()));
        }
        if items.iter().any(|item| item.customer_id != customer_id) {
            return Err(ServiceError::ValidationError(
                "Cart lines do not all belong to the customer".to_string(),
            ));
        }

        // Resolve every product up front; the total and the snapshots must
        // see the same price.
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let product = Product::find_by_id(item.product_id)
                .one(conn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;
            lines.push((item, product));
        }

        let total_amount: i64 = lines
            .iter()
            .map(|(item, product)| product.price * i64::from(item.quantity))
            .sum();

        let now = Utc::now();
        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            uid: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            total_amount: Set(total_amount),
            status: Set(OrderStatus::Requested),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order = order.insert(conn).await?;

        for (item, product) in lines {
            let snapshot = ordered_product::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(product.id),
                name: Set(product.name.clone()),
                price: Set(product.price),
                quantity: Set(item.quantity),
                // Per-row timestamp preserves the cart's line order for
                // display purposes.
                created_at: Set(Utc::now()),
            };
            snapshot.insert(conn).await?;
        }

        Ok(order)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Fetches an order scoped to its owner; another customer's order reads
    /// as absent.
    pub async fn get_order_for_customer(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .filter(order::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// The order's frozen snapshot rows, in cart-line order.
    pub async fn ordered_products(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<ordered_product::Model>, ServiceError> {
        let items = OrderedProduct::find()
            .filter(ordered_product::Column::OrderId.eq(order_id))
            .order_by_asc(ordered_product::Column::CreatedAt)
            .order_by_asc(ordered_product::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(items)
    }

    pub async fn order_display_name(&self, order_id: Uuid) -> Result<String, ServiceError> {
        let items = self.ordered_products(order_id).await?;
        Ok(display_name(&items))
    }

    /// The customer's successfully paid orders, newest first.
    pub async fn list_paid_orders(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<order::Model>, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .filter(order::Column::Status.eq(OrderStatus::Paid))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str) -> ordered_product::Model {
        ordered_product::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            name: name.to_string(),
            price: 1000,
            quantity: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn display_name_placeholder_without_items() {
        assert_eq!(display_name(&[]), "no items");
    }

    #[test]
    fn display_name_single_item_uses_its_name() {
        assert_eq!(display_name(&[snapshot("Americano")]), "Americano");
    }

    #[test]
    fn display_name_counts_remaining_items() {
        let items = [snapshot("Americano"), snapshot("Latte"), snapshot("Mocha")];
        assert_eq!(display_name(&items), "Americano and 2 more");
    }
}
