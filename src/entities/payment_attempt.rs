use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One try at settling an amount through the external payment gateway.
///
/// `order_id = Some(..)` is the production, order-bound kind whose
/// verification result cascades onto the parent order; `order_id = None` is
/// the standalone kind used for gateway smoke testing. `is_paid_ok` is
/// derived exclusively from the gateway-reported status plus strict amount
/// equality and must never be written from client-supplied data.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_attempts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub uid: Uuid,
    #[sea_orm(nullable)]
    pub order_id: Option<Uuid>,
    /// Raw gateway payload from the last verification, kept verbatim for
    /// audit and debugging.
    #[sea_orm(column_type = "Json")]
    pub meta: Json,
    pub name: String,
    pub desired_amount: i64,
    pub buyer_name: String,
    pub buyer_email: String,
    pub pay_method: PayMethod,
    pub pay_status: PayStatus,
    pub is_paid_ok: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Merchant-facing identifier sent to the gateway, the hyphenated uuid
    /// string form.
    pub fn merchant_uid(&self) -> String {
        self.uid.to_string()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

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
pub enum PayMethod {
    #[sea_orm(string_value = "card")]
    Card,
}

/// Payment states as reported by the gateway.
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
pub enum PayStatus {
    #[sea_orm(string_value = "ready")]
    Ready,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "canceled")]
    Canceled,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl PayStatus {
    /// Maps the status string of a gateway payload. The gateway spells
    /// cancellation "cancelled"; both spellings are accepted.
    pub fn from_gateway(value: &str) -> Option<Self> {
        match value {
            "ready" => Some(Self::Ready),
            "paid" => Some(Self::Paid),
            "canceled" | "cancelled" => Some(Self::Canceled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_status_mapping() {
        assert_eq!(PayStatus::from_gateway("paid"), Some(PayStatus::Paid));
        assert_eq!(
            PayStatus::from_gateway("cancelled"),
            Some(PayStatus::Canceled)
        );
        assert_eq!(
            PayStatus::from_gateway("canceled"),
            Some(PayStatus::Canceled)
        );
        assert_eq!(PayStatus::from_gateway("refunded"), None);
    }

    #[test]
    fn merchant_uid_is_hyphenated() {
        let model = Model {
            id: Uuid::new_v4(),
            uid: Uuid::new_v4(),
            order_id: None,
            meta: serde_json::json!({}),
            name: "test".to_string(),
            desired_amount: 1000,
            buyer_name: "buyer".to_string(),
            buyer_email: "buyer@example.com".to_string(),
            pay_method: PayMethod::Card,
            pay_status: PayStatus::Ready,
            is_paid_ok: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(model.merchant_uid(), model.uid.to_string());
        assert!(model.merchant_uid().contains('-'));
    }
}
