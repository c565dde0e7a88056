use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order entity: the immutable-total, mutable-status record produced by
/// checkout.
///
/// `total_amount` is computed once from the cart at creation and never
/// recomputed; later product price edits must not touch it. `uid` is the
/// random external-facing identifier, distinct from the primary key.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub uid: Uuid,
    pub customer_id: Uuid,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// A new payment attempt is allowed only while the order is still
    /// waiting for a successful payment.
    pub fn can_pay(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Requested | OrderStatus::FailedPayment
        )
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    #[sea_orm(has_many = "super::ordered_product::Entity")]
    OrderedProducts,
    #[sea_orm(has_many = "super::payment_attempt::Entity")]
    PaymentAttempts,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::ordered_product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderedProducts.def()
    }
}

impl Related<super::payment_attempt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentAttempts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Order progression. Fulfillment states past `Paid` are labels only; the
/// transitions that matter here are Requested/FailedPayment <-> payment
/// outcomes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "requested")]
    Requested,
    #[sea_orm(string_value = "failed_payment")]
    FailedPayment,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "prepared_product")]
    PreparedProduct,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "canceled")]
    Canceled,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_with_status(status: OrderStatus) -> Model {
        Model {
            id: Uuid::new_v4(),
            uid: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            total_amount: 1000,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn can_pay_only_in_payable_states() {
        assert!(order_with_status(OrderStatus::Requested).can_pay());
        assert!(order_with_status(OrderStatus::FailedPayment).can_pay());

        for status in [
            OrderStatus::Paid,
            OrderStatus::PreparedProduct,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Canceled,
        ] {
            assert!(!order_with_status(status).can_pay(), "{status} is payable");
        }
    }
}
