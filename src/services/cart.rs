use crate::{
    entities::{
        cart_item,
        product::{self, ProductStatus},
        CartItem, Customer, Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// One cart row joined with its product. `amount` is computed from the
/// product's current price, not a stored value.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub item: cart_item::Model,
    pub product: product::Model,
    pub amount: i64,
}

impl CartLine {
    fn new(item: cart_item::Model, product: product::Model) -> Self {
        let amount = product.price * i64::from(item.quantity);
        Self {
            item,
            product,
            amount,
        }
    }
}

/// Per-customer mutable cart: (customer, product) rows with quantities.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Adds a purchasable product to the customer's cart. A repeat add for
    /// the same product merges into the existing row by incrementing its
    /// quantity.
    #[instrument(skip(self))]
    pub async fn add_to_cart(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        Customer::find_by_id(customer_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))?;

        // Only active products are visible to the storefront; everything
        // else reads as absent.
        Product::find_by_id(product_id)
            .filter(product::Column::Status.eq(ProductStatus::Active))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CustomerId.eq(customer_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;

        let item = match existing {
            Some(item) => {
                let merged = item.quantity + quantity;
                let mut active: cart_item::ActiveModel = item.into();
                active.quantity = Set(merged);
                active.updated_at = Set(Utc::now());
                active.update(&txn).await?
            }
            None => {
                let now = Utc::now();
                let active = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    customer_id: Set(customer_id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                active.insert(&txn).await?
            }
        };

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                customer_id,
                product_id,
                quantity,
            })
            .await;
        info!(customer_id = %customer_id, product_id = %product_id, "Cart item added");
        Ok(item)
    }

    /// Sets the quantity of an existing cart row. Quantity zero removes the
    /// row; the returned `None` reflects that.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Option<cart_item::Model>, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must not be negative".to_string(),
            ));
        }

        let item = self.find_item(customer_id, product_id).await?;

        if quantity == 0 {
            item.delete(&*self.db).await?;
            self.event_sender
                .send_or_log(Event::CartItemRemoved {
                    customer_id,
                    product_id,
                })
                .await;
            return Ok(None);
        }

        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;
        Ok(Some(updated))
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        let item = self.find_item(customer_id, product_id).await?;
        item.delete(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                customer_id,
                product_id,
            })
            .await;
        Ok(())
    }

    /// The customer's cart, ordered by product name, each line carrying the
    /// live amount.
    pub async fn cart_detail(&self, customer_id: Uuid) -> Result<Vec<CartLine>, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::CustomerId.eq(customer_id))
            .find_also_related(Product)
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await?;

        rows.into_iter()
            .map(|(item, product)| {
                let product = product.ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "cart line {} references a missing product",
                        item.id
                    ))
                })?;
                Ok(CartLine::new(item, product))
            })
            .collect()
    }

    async fn find_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<cart_item::Model, ServiceError> {
        CartItem::find()
            .filter(cart_item::Column::CustomerId.eq(customer_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Product {} is not in the cart of customer {}",
                    product_id, customer_id
                ))
            })
    }
}
