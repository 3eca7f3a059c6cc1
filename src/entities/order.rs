use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of an order.
///
/// `AwaitingPayment -> Processing` on a successful payment webhook,
/// `Processing -> Done` on the operator's finish action, and
/// `Processing -> AwaitingPayment` when the gateway reports a failure.
/// `Done` is terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[sea_orm(string_value = "AWAITING_PAYMENT")]
    AwaitingPayment,
    #[sea_orm(string_value = "PROCESSING")]
    Processing,
    #[sea_orm(string_value = "DONE")]
    Done,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::AwaitingPayment => "AWAITING_PAYMENT",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Done => "DONE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Done)
    }

    /// Edges of the order state machine.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::AwaitingPayment, OrderStatus::Processing)
                | (OrderStatus::Processing, OrderStatus::Done)
                | (OrderStatus::Processing, OrderStatus::AwaitingPayment)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order totals are fixed at creation and never recomputed.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub subtotal: i64,
    pub tax: i64,
    pub grandtotal: i64,
    pub status: OrderStatus,
    pub external_transaction_id: Option<String>,
    pub payment_method_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = active_model.status {
                active_model.status = Set(OrderStatus::AwaitingPayment);
            }
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_in_screaming_snake_case() {
        let json = serde_json::to_string(&OrderStatus::AwaitingPayment).unwrap();
        assert_eq!(json, "\"AWAITING_PAYMENT\"");
        let parsed: OrderStatus = serde_json::from_str("\"DONE\"").unwrap();
        assert_eq!(parsed, OrderStatus::Done);
    }

    #[test]
    fn transitions_follow_the_lifecycle() {
        use OrderStatus::*;
        assert!(AwaitingPayment.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Done));
        assert!(Processing.can_transition_to(AwaitingPayment));

        assert!(!AwaitingPayment.can_transition_to(Done));
        assert!(!Done.can_transition_to(Processing));
        assert!(!Done.can_transition_to(AwaitingPayment));
        assert!(!Processing.can_transition_to(Processing));
    }

    #[test]
    fn only_done_is_terminal() {
        assert!(OrderStatus::Done.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
        assert!(!OrderStatus::AwaitingPayment.is_terminal());
    }
}
