use crate::config::AppConfig;
use crate::entities;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use std::time::Duration;
use tracing::info;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Establishes a connection pool from the application configuration.
pub async fn establish_connection(cfg: &AppConfig) -> Result<DbPool, DbErr> {
    let mut options = ConnectOptions::new(cfg.database_url.clone());
    options
        .max_connections(10)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);

    // A pooled sqlite in-memory database would hand each connection its own
    // empty database.
    if cfg.database_url.contains("sqlite::memory:") {
        options.max_connections(1);
    }

    let db = Database::connect(options).await?;
    info!("Database connection established");
    Ok(db)
}

async fn create_table<E: EntityTrait>(db: &DbPool, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}

/// Creates any missing tables and indexes from the entity definitions.
pub async fn ensure_schema(db: &DbPool) -> Result<(), DbErr> {
    create_table(db, entities::Category).await?;
    create_table(db, entities::Product).await?;
    create_table(db, entities::Customer).await?;
    create_table(db, entities::CartItem).await?;
    create_table(db, entities::Order).await?;
    create_table(db, entities::OrderedProduct).await?;
    create_table(db, entities::PaymentAttempt).await?;

    // One cart row per (customer, product); repeat adds merge quantities.
    let backend = db.get_database_backend();
    let unique_cart_line = sea_orm::sea_query::Index::create()
        .name("uq_cart_items_customer_product")
        .table(entities::cart_item::Entity)
        .col(entities::cart_item::Column::CustomerId)
        .col(entities::cart_item::Column::ProductId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&unique_cart_line)).await?;

    info!("Database schema ensured");
    Ok(())
}
