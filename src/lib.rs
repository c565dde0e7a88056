//! Storefront API Library
//!
//! Online shop core: product catalog, per-customer carts, checkout that
//! freezes a cart into an immutable order, and reconciliation of payment
//! attempts against an external payment gateway.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::gateway::PaymentGateway;
use crate::handlers::AppServices;
use crate::services::{CartService, CatalogService, CustomerService, OrderService, PaymentService};

/// Shared application state handed to the HTTP layer.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: EventSender,
    pub services: AppServices,
}

impl AppState {
    /// Wires the service bundle from its dependencies. The gateway client
    /// is injected so tests can substitute a scripted one.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: EventSender,
    ) -> Self {
        let services = AppServices {
            catalog: CatalogService::new(db.clone(), event_sender.clone()),
            customers: CustomerService::new(db.clone(), event_sender.clone()),
            cart: CartService::new(db.clone(), event_sender.clone()),
            orders: OrderService::new(db.clone(), event_sender.clone()),
            payments: PaymentService::new(
                db.clone(),
                gateway,
                config.gateway.clone(),
                event_sender.clone(),
            ),
        };
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}
