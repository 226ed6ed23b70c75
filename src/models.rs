use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            "refunded" => Some(OrderStatus::Refunded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "processing" => Some(PaymentStatus::Processing),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            "cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Processing,
    Success,
    Failed,
    PendingSettlement,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Processing => "processing",
            RefundStatus::Success => "success",
            RefundStatus::Failed => "failed",
            RefundStatus::PendingSettlement => "pending_settlement",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RefundStatus::Pending),
            "processing" => Some(RefundStatus::Processing),
            "success" => Some(RefundStatus::Success),
            "failed" => Some(RefundStatus::Failed),
            "pending_settlement" => Some(RefundStatus::PendingSettlement),
            _ => None,
        }
    }

    /// Allowed transitions of the refund state machine. SUCCESS and FAILED
    /// are terminal; PENDING_SETTLEMENT only goes back through PENDING when
    /// the retry scheduler (or an operator) re-claims the refund.
    pub fn can_transition_to(&self, next: RefundStatus) -> bool {
        matches!(
            (*self, next),
            (
                RefundStatus::Pending,
                RefundStatus::Processing
                    | RefundStatus::PendingSettlement
                    | RefundStatus::Failed
            ) | (
                RefundStatus::Processing,
                RefundStatus::Success | RefundStatus::Failed
            ) | (RefundStatus::PendingSettlement, RefundStatus::Pending)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RefundStatus::Success | RefundStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundType {
    Full,
    Partial,
}

impl RefundType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundType::Full => "full",
            RefundType::Partial => "partial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(RefundType::Full),
            "partial" => Some(RefundType::Partial),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Completed,
    Failed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ScheduleStatus::Pending),
            "completed" => Some(ScheduleStatus::Completed),
            "failed" => Some(ScheduleStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub track_inventory: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VariantOption {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub price_adjustment: Decimal,
    pub stock_quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub status: String,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub discount: Decimal,
    pub total_amount: Decimal,
    pub shipping_address: String,
    pub billing_address: Option<String>,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub variant_option_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,
    pub status: String,
    pub amount: Decimal,
    pub currency: String,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderRefund {
    pub id: Uuid,
    pub order_id: Uuid,
    pub refund_type: String,
    pub refund_amount: Decimal,
    pub gateway_refund_id: Option<String>,
    pub refund_status: String,
    pub failure_reason: Option<String>,
    pub settlement_expected_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefundRetrySchedule {
    pub id: Uuid,
    pub refund_id: Uuid,
    pub retry_at: DateTime<Utc>,
    pub status: String,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<entity::orders::Model> for Order {
    fn from(model: entity::orders::Model) -> Self {
        Order {
            id: model.id,
            user_id: model.user_id,
            order_number: model.order_number,
            status: model.status,
            subtotal: model.subtotal,
            tax_amount: model.tax_amount,
            shipping_cost: model.shipping_cost,
            discount: model.discount,
            total_amount: model.total_amount,
            shipping_address: model.shipping_address,
            billing_address: model.billing_address,
            payment_method: model.payment_method,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<entity::order_items::Model> for OrderItem {
    fn from(model: entity::order_items::Model) -> Self {
        OrderItem {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            variant_option_id: model.variant_option_id,
            quantity: model.quantity,
            unit_price: model.unit_price,
            subtotal: model.subtotal,
            tax_amount: model.tax_amount,
            total_price: model.total_price,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<entity::payments::Model> for Payment {
    fn from(model: entity::payments::Model) -> Self {
        Payment {
            id: model.id,
            order_id: model.order_id,
            gateway_order_id: model.gateway_order_id,
            gateway_payment_id: model.gateway_payment_id,
            gateway_signature: model.gateway_signature,
            status: model.status,
            amount: model.amount,
            currency: model.currency,
            failure_reason: model.failure_reason,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<entity::order_refunds::Model> for OrderRefund {
    fn from(model: entity::order_refunds::Model) -> Self {
        OrderRefund {
            id: model.id,
            order_id: model.order_id,
            refund_type: model.refund_type,
            refund_amount: model.refund_amount,
            gateway_refund_id: model.gateway_refund_id,
            refund_status: model.refund_status,
            failure_reason: model.failure_reason,
            settlement_expected_date: model
                .settlement_expected_date
                .map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<entity::refund_retry_schedules::Model> for RefundRetrySchedule {
    fn from(model: entity::refund_retry_schedules::Model) -> Self {
        RefundRetrySchedule {
            id: model.id,
            refund_id: model.refund_id,
            retry_at: model.retry_at.with_timezone(&Utc),
            status: model.status,
            retry_count: model.retry_count,
            last_error: model.last_error,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<entity::products::Model> for Product {
    fn from(model: entity::products::Model) -> Self {
        Product {
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            sale_price: model.sale_price,
            stock_quantity: model.stock_quantity,
            track_inventory: model.track_inventory,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<entity::variant_options::Model> for VariantOption {
    fn from(model: entity::variant_options::Model) -> Self {
        VariantOption {
            id: model.id,
            product_id: model.product_id,
            name: model.name,
            price_adjustment: model.price_adjustment,
            stock_quantity: model.stock_quantity,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("paid"), None);
        assert_eq!(PaymentStatus::parse("completed"), Some(PaymentStatus::Completed));
        assert_eq!(PaymentStatus::parse("COMPLETED"), None);
        assert_eq!(
            RefundStatus::parse("pending_settlement"),
            Some(RefundStatus::PendingSettlement)
        );
        assert_eq!(RefundStatus::parse("settled"), None);
    }

    #[test]
    fn refund_transitions_follow_the_state_machine() {
        use RefundStatus::*;

        // Submission outcomes from PENDING.
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(PendingSettlement));
        assert!(Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Success));

        // Only the poller resolves PROCESSING, and only to a terminal state.
        assert!(Processing.can_transition_to(Success));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Processing.can_transition_to(PendingSettlement));

        // A settlement hold is only re-entered through a fresh submission.
        assert!(PendingSettlement.can_transition_to(Pending));
        assert!(!PendingSettlement.can_transition_to(Processing));
        assert!(!PendingSettlement.can_transition_to(Success));

        // Terminal states have no successors.
        for terminal in [Success, Failed] {
            assert!(terminal.is_terminal());
            for next in [Pending, Processing, Success, Failed, PendingSettlement] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }
}
