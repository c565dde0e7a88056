use crate::{
    config::GatewayConfig,
    entities::{
        order,
        order::OrderStatus,
        payment_attempt::{self, PayMethod, PayStatus},
        Customer, Order, PaymentAttempt,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::PaymentGateway,
    services::orders,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Everything the payment-initiation surface needs to hand the buyer over
/// to the gateway widget.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentInitiation {
    pub shop_id: String,
    pub pay_channel: String,
    pub merchant_uid: String,
    pub name: String,
    pub amount: i64,
    pub buyer_name: String,
    pub buyer_email: String,
}

#[derive(Debug, Deserialize)]
pub struct StandaloneAttemptInput {
    pub name: String,
    pub amount: i64,
    pub buyer_name: String,
    pub buyer_email: String,
}

/// Result of a reconciliation run. `order` is populated for order-bound
/// attempts, reflecting the parent order after any cascade.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub attempt: payment_attempt::Model,
    pub order: Option<order::Model>,
}

/// Payment reconciler: creates payment attempts and verifies them against
/// the external gateway, cascading results onto the parent order.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    config: GatewayConfig,
    event_sender: EventSender,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        config: GatewayConfig,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            gateway,
            config,
            event_sender,
        }
    }

    /// Creates a fresh attempt for the order. The desired amount is frozen
    /// from the order total and the buyer identity is copied from the
    /// order's customer. Prior attempts are left alone; every call yields a
    /// new independent row, which is what allows payment retries.
    ///
    /// Whether the order is in a payable state is the caller's gate
    /// (`order.can_pay()`), applied before calling this.
    #[instrument(skip(self))]
    pub async fn create_attempt_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<payment_attempt::Model, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let customer = Customer::find_by_id(order.customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", order.customer_id))
            })?;

        let snapshots = crate::entities::OrderedProduct::find()
            .filter(crate::entities::ordered_product::Column::OrderId.eq(order.id))
            .order_by_asc(crate::entities::ordered_product::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        let name = orders::display_name(&snapshots);

        let now = Utc::now();
        let attempt = payment_attempt::ActiveModel {
            id: Set(Uuid::new_v4()),
            uid: Set(Uuid::new_v4()),
            order_id: Set(Some(order.id)),
            meta: Set(serde_json::json!({})),
            name: Set(name),
            desired_amount: Set(order.total_amount),
            buyer_name: Set(customer.name),
            buyer_email: Set(customer.email),
            pay_method: Set(PayMethod::Card),
            pay_status: Set(PayStatus::Ready),
            is_paid_ok: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let attempt = attempt.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::PaymentAttemptCreated {
                attempt_id: attempt.id,
                order_id: Some(order.id),
            })
            .await;
        info!(attempt_id = %attempt.id, order_id = %order.id, "Payment attempt created");
        Ok(attempt)
    }

    /// Creates an attempt bound to no order, used to smoke-test the gateway
    /// integration. Its verification never touches order state.
    #[instrument(skip(self, input))]
    pub async fn create_standalone_attempt(
        &self,
        input: StandaloneAttemptInput,
    ) -> Result<payment_attempt::Model, ServiceError> {
        if input.amount < 1 {
            return Err(ServiceError::ValidationError(
                "Amount must be at least 1".to_string(),
            ));
        }

        let now = Utc::now();
        let attempt = payment_attempt::ActiveModel {
            id: Set(Uuid::new_v4()),
            uid: Set(Uuid::new_v4()),
            order_id: Set(None),
            meta: Set(serde_json::json!({})),
            name: Set(input.name),
            desired_amount: Set(input.amount),
            buyer_name: Set(input.buyer_name),
            buyer_email: Set(input.buyer_email),
            pay_method: Set(PayMethod::Card),
            pay_status: Set(PayStatus::Ready),
            is_paid_ok: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let attempt = attempt.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::PaymentAttemptCreated {
                attempt_id: attempt.id,
                order_id: None,
            })
            .await;
        Ok(attempt)
    }

    pub async fn get_attempt(
        &self,
        attempt_id: Uuid,
    ) -> Result<payment_attempt::Model, ServiceError> {
        PaymentAttempt::find_by_id(attempt_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Payment attempt {} not found", attempt_id))
            })
    }

    /// The handoff payload for the payment-initiation surface.
    pub fn payment_initiation(&self, attempt: &payment_attempt::Model) -> PaymentInitiation {
        PaymentInitiation {
            shop_id: self.config.shop_id.clone(),
            pay_channel: self.config.pay_channel.clone(),
            merchant_uid: attempt.merchant_uid(),
            name: attempt.name.clone(),
            amount: attempt.desired_amount,
            buyer_name: attempt.buyer_name.clone(),
            buyer_email: attempt.buyer_email.clone(),
        }
    }

    /// Verifies the attempt against the gateway and applies the result.
    ///
    /// The gateway payload is stored verbatim in `meta`, the pay status is
    /// taken from the gateway, and `is_paid_ok` is true only when the
    /// gateway reports "paid" AND the reported amount strictly equals the
    /// frozen desired amount. A "paid" status with a mismatched amount is a
    /// normal negative outcome, not an error: it keeps an under-paying
    /// request from ever marking an order paid.
    ///
    /// For order-bound attempts the result cascades onto the parent order
    /// in the same transaction: success sets the order PAID and deletes all
    /// sibling attempts, leaving exactly one payment record per paid order;
    /// a canceled or failed status sets FAILED_PAYMENT; an inconclusive
    /// READY result leaves the order untouched. Re-running reconcile with
    /// unchanged gateway state reproduces the same final state.
    ///
    /// Gateway failures, transport or application alike, are logged with
    /// full context and surfaced as NotFound with no mutation.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, attempt_id: Uuid) -> Result<ReconcileOutcome, ServiceError> {
        let attempt = self.get_attempt(attempt_id).await?;
        let merchant_uid = attempt.merchant_uid();

        let payload = match self.gateway.lookup(&merchant_uid).await {
            Ok(payload) => payload,
            Err(e) => {
                error!(
                    error = %e,
                    attempt_id = %attempt.id,
                    merchant_uid = %merchant_uid,
                    "payment verification unavailable"
                );
                return Err(ServiceError::NotFound(
                    "Payment record could not be located".to_string(),
                ));
            }
        };

        let paid_ok =
            payload.status == PayStatus::Paid && payload.amount == attempt.desired_amount;

        let txn = self.db.begin().await?;

        let mut active: payment_attempt::ActiveModel = attempt.into();
        active.meta = Set(payload.raw);
        active.pay_status = Set(payload.status);
        active.is_paid_ok = Set(paid_ok);
        active.updated_at = Set(Utc::now());
        let attempt = active.update(&txn).await?;

        let mut order_out = None;
        let mut status_change = None;
        if let Some(order_id) = attempt.order_id {
            let parent = Order::find_by_id(order_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

            if paid_ok {
                let old_status = parent.status;
                let mut parent: order::ActiveModel = parent.into();
                parent.status = Set(OrderStatus::Paid);
                parent.updated_at = Set(Utc::now());
                let parent = parent.update(&txn).await?;

                // Exactly one payment record survives a successful payment.
                // Re-running this after the siblings are gone is a no-op.
                PaymentAttempt::delete_many()
                    .filter(payment_attempt::Column::OrderId.eq(order_id))
                    .filter(payment_attempt::Column::Id.ne(attempt.id))
                    .exec(&txn)
                    .await?;

                if old_status != OrderStatus::Paid {
                    status_change = Some((old_status, OrderStatus::Paid));
                }
                order_out = Some(parent);
            } else if matches!(attempt.pay_status, PayStatus::Canceled | PayStatus::Failed) {
                let old_status = parent.status;
                let mut parent: order::ActiveModel = parent.into();
                parent.status = Set(OrderStatus::FailedPayment);
                parent.updated_at = Set(Utc::now());
                let parent = parent.update(&txn).await?;

                if old_status != OrderStatus::FailedPayment {
                    status_change = Some((old_status, OrderStatus::FailedPayment));
                }
                order_out = Some(parent);
            } else {
                // READY without is_paid_ok: verification is still pending,
                // the order keeps its state.
                order_out = Some(parent);
            }
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::PaymentVerified {
                attempt_id: attempt.id,
                paid_ok,
            })
            .await;
        if let Some((old_status, new_status)) = status_change {
            if let Some(order) = &order_out {
                self.event_sender
                    .send_or_log(Event::OrderStatusChanged {
                        order_id: order.id,
                        old_status: old_status.to_string(),
                        new_status: new_status.to_string(),
                    })
                    .await;
            }
        }

        info!(
            attempt_id = %attempt.id,
            pay_status = %attempt.pay_status,
            paid_ok,
            "Payment attempt reconciled"
        );
        Ok(ReconcileOutcome {
            attempt,
            order: order_out,
        })
    }

    /// Confirmation-callback entry point: the external redirect hands back
    /// an (order, attempt) pair; the attempt must belong to the order.
    #[instrument(skip(self))]
    pub async fn confirm(
        &self,
        order_id: Uuid,
        attempt_id: Uuid,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let attempt = PaymentAttempt::find_by_id(attempt_id)
            .filter(payment_attempt::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Payment attempt {} not found for order {}",
                    attempt_id, order_id
                ))
            })?;

        self.reconcile(attempt.id).await
    }
}
