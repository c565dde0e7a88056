use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the services after their transactions commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CategoryCreated(Uuid),
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    CustomerCreated(Uuid),

    CartItemAdded {
        customer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartItemRemoved {
        customer_id: Uuid,
        product_id: Uuid,
    },
    CartCleared(Uuid),

    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    PaymentAttemptCreated {
        attempt_id: Uuid,
        order_id: Option<Uuid>,
    },
    PaymentVerified {
        attempt_id: Uuid,
        paid_ok: bool,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("Failed to send event: {}", e)))
    }

    /// Sends an event, logging instead of failing when the consumer is gone.
    /// Events are observability signals; losing one must not fail the
    /// operation that produced it.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "event dropped");
        }
    }
}

/// Consumes events from the channel and logs them. The sender half closing
/// ends the task.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "event received");
    }
    info!("event channel closed; event processor exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn send_surfaces_a_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        let result = sender.send(Event::OrderCreated(Uuid::new_v4())).await;
        assert_matches!(result, Err(ServiceError::EventError(_)));
    }

    #[tokio::test]
    async fn send_or_log_never_fails_the_caller() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        // Must return normally even with the consumer gone.
        sender.send_or_log(Event::CartCleared(Uuid::new_v4())).await;
    }
}
