use crate::{
    entities::{customer, Customer},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerInput {
    #[validate(length(min = 1, max = 100, message = "Customer name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
}

/// Minimal buyer identity store. Account lifecycle (passwords, sessions)
/// lives outside this core; orders and payment attempts only need a name
/// and email to copy onto gateway requests.
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_customer(
        &self,
        input: CreateCustomerInput,
    ) -> Result<customer::Model, ServiceError> {
        let input = CreateCustomerInput {
            name: input.name.trim().to_string(),
            email: input.email.trim().to_string(),
        };
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let model = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            email: Set(input.email),
            created_at: Set(Utc::now()),
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CustomerCreated(created.id))
            .await;
        info!(customer_id = %created.id, "Customer created");
        Ok(created)
    }

    pub async fn get_customer(&self, customer_id: Uuid) -> Result<customer::Model, ServiceError> {
        Customer::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, email: &str) -> CreateCustomerInput {
        CreateCustomerInput {
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn well_formed_input_passes() {
        assert!(input("Alice", "alice@example.com").validate().is_ok());
    }

    #[test]
    fn truncated_email_is_rejected() {
        assert!(input("Alice", "a@").validate().is_err());
        assert!(input("Alice", "alice").validate().is_err());
        assert!(input("Alice", "").validate().is_err());
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(input("", "alice@example.com").validate().is_err());
    }
}
