#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use storefront_api::{
    config::AppConfig,
    db,
    entities::payment_attempt::PayStatus,
    entities::product::ProductStatus,
    events::{self, EventSender},
    gateway::{GatewayError, GatewayPayment, PaymentGateway},
    services::catalog::CreateProductInput,
    services::customers::CreateCustomerInput,
    AppState,
};
use uuid::Uuid;

/// Scripted stand-in for the external gateway: tests choose what the
/// "source of truth" reports for each merchant uid.
#[derive(Default)]
pub struct MockGateway {
    payments: Mutex<HashMap<String, (PayStatus, i64)>>,
    unavailable: AtomicBool,
}

impl MockGateway {
    pub fn set_payment(&self, merchant_uid: &str, status: PayStatus, amount: i64) {
        self.payments
            .lock()
            .unwrap()
            .insert(merchant_uid.to_string(), (status, amount));
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn lookup(&self, merchant_uid: &str) -> Result<GatewayPayment, GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        let payments = self.payments.lock().unwrap();
        match payments.get(merchant_uid) {
            Some(&(status, amount)) => Ok(GatewayPayment {
                status,
                amount,
                raw: json!({
                    "merchant_uid": merchant_uid,
                    "status": status.to_string(),
                    "amount": amount,
                    "pay_method": "card",
                }),
            }),
            None => Err(GatewayError::Api {
                code: 1,
                message: "payment record not found".to_string(),
            }),
        }
    }
}

/// Test harness over an in-memory sqlite database with a scripted gateway.
pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        cfg.gateway.shop_id = "imp00000000".to_string();
        cfg.gateway.pay_channel = "html5_inicis".to_string();

        let pool = db::establish_connection(&cfg)
            .await
            .expect("failed to create test database");
        db::ensure_schema(&pool)
            .await
            .expect("failed to create test schema");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        tokio::spawn(events::process_events(event_rx));

        let gateway = Arc::new(MockGateway::default());
        let state = AppState::new(
            Arc::new(pool),
            Arc::new(cfg),
            gateway.clone(),
            event_sender,
        );

        Self { state, gateway }
    }

    pub async fn seed_customer(&self, name: &str, email: &str) -> Uuid {
        self.state
            .services
            .customers
            .create_customer(CreateCustomerInput {
                name: name.to_string(),
                email: email.to_string(),
            })
            .await
            .expect("failed to create test customer")
            .id
    }

    pub async fn seed_product(&self, name: &str, price: i64, status: ProductStatus) -> Uuid {
        let category = self
            .state
            .services
            .catalog
            .create_category(&format!("category for {}", name))
            .await
            .expect("failed to create test category");

        self.state
            .services
            .catalog
            .create_product(CreateProductInput {
                category_id: category.id,
                name: name.to_string(),
                description: String::new(),
                price,
                status: Some(status),
                photo: None,
            })
            .await
            .expect("failed to create test product")
            .id
    }
}
