use crate::{
    entities::{
        category,
        product::{self, ProductStatus},
        Category, Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Read-mostly catalog store: categories and the products they own.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    pub category_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "Product name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0, message = "Price must be non-negative"))]
    pub price: i64,
    pub status: Option<ProductStatus>,
    pub photo: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductListPage {
    pub products: Vec<product::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn create_category(&self, name: &str) -> Result<category::Model, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "Category name is required".to_string(),
            ));
        }

        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CategoryCreated(created.id))
            .await;
        info!(category_id = %created.id, "Category created");
        Ok(created)
    }

    /// Creates a product. New products start out `Inactive` unless the input
    /// says otherwise.
    #[instrument(skip(self, input), fields(category_id = %input.category_id))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        Category::find_by_id(input.category_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Category {} not found", input.category_id))
            })?;

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            category_id: Set(input.category_id),
            name: Set(input.name),
            description: Set(input.description),
            price: Set(input.price),
            status: Set(input.status.unwrap_or(ProductStatus::Inactive)),
            photo: Set(input.photo),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(created.id))
            .await;
        info!(product_id = %created.id, "Product created");
        Ok(created)
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// Fetches a product only if it can currently be purchased. Anything
    /// other than `Active` reads as absent, matching the storefront's view
    /// of the catalog.
    pub async fn get_purchasable_product(
        &self,
        product_id: Uuid,
    ) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .filter(product::Column::Status.eq(ProductStatus::Active))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// Lists active products, newest first, with an optional
    /// case-insensitive name search.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        query: Option<String>,
        page: u64,
        per_page: u64,
    ) -> Result<ProductListPage, ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page numbers start at 1".to_string(),
            ));
        }

        let mut select = Product::find()
            .filter(product::Column::Status.eq(ProductStatus::Active))
            .order_by_desc(product::Column::CreatedAt);
        if let Some(q) = query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            select = select.filter(product::Column::Name.contains(q));
        }

        let paginator = select.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page - 1).await?;

        Ok(ProductListPage {
            products,
            total,
            page,
            per_page,
        })
    }

    /// Re-prices a product. Past orders keep the price they snapshotted.
    #[instrument(skip(self))]
    pub async fn update_price(
        &self,
        product_id: Uuid,
        price: i64,
    ) -> Result<product::Model, ServiceError> {
        if price < 0 {
            return Err(ServiceError::ValidationError(
                "Price must be non-negative".to_string(),
            ));
        }

        let product = self.get_product(product_id).await?;
        let mut active: product::ActiveModel = product.into();
        active.price = Set(price);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        product_id: Uuid,
        status: ProductStatus,
    ) -> Result<product::Model, ServiceError> {
        let product = self.get_product(product_id).await?;
        let mut active: product::ActiveModel = product.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;
        Ok(updated)
    }
}
