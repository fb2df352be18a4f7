use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::conversation::ConversationId;
use crate::domain::customer::CustomerId;
use crate::domain::store::StoreId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short suffix used in oracle context and operator-facing summaries.
    pub fn short(&self) -> String {
        let raw = self.0.simple().to_string();
        raw[raw.len() - 4..].to_string()
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "processing" => Some(Self::Processing),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Qpay,
    BankTransfer,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Qpay => "qpay",
            Self::BankTransfer => "bank_transfer",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cash" => Some(Self::Cash),
            "qpay" => Some(Self::Qpay),
            "bank_transfer" => Some(Self::BankTransfer),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub invoice_id: Option<String>,
    pub qr_payload: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    /// Always sourced from the matched catalog product, never from the
    /// extraction oracle.
    pub price: Decimal,
    pub subtotal: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiExtraction {
    pub raw_message: String,
    pub confidence: f64,
    pub needs_review: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub store_id: StoreId,
    pub customer_id: CustomerId,
    pub conversation_id: ConversationId,
    pub items: Vec<OrderItem>,
    pub phone_number: String,
    pub address: String,
    pub has_delivery: bool,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_details: PaymentDetails,
    pub ai_extraction: AiExtraction,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Recomputes every subtotal and the order total from item price and
    /// quantity, overriding any prior value. Must run immediately before
    /// persistence.
    pub fn recompute_total(&mut self) {
        let mut total = Decimal::ZERO;
        for item in &mut self.items {
            item.subtotal = item.price * Decimal::from(item.quantity);
            total += item.subtotal;
        }
        self.total_amount = total;
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self.status, next),
            (Pending, Confirmed)
                | (Confirmed, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Delivered, Completed)
                | (Confirmed, Completed)
                | (_, Cancelled)
        )
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }
        Err(DomainError::InvalidOrderTransition { from: self.status, to: next })
    }

    pub fn mark_paid(&mut self, transaction_id: Option<String>) {
        self.payment_status = PaymentStatus::Paid;
        self.payment_details.paid_at = Some(Utc::now());
        self.payment_details.transaction_id = transaction_id;
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        AiExtraction, Order, OrderId, OrderItem, OrderStatus, PaymentDetails, PaymentMethod,
        PaymentStatus,
    };
    use crate::domain::conversation::ConversationId;
    use crate::domain::customer::CustomerId;
    use crate::domain::store::StoreId;

    fn order(items: Vec<OrderItem>) -> Order {
        Order {
            id: OrderId::new(),
            store_id: StoreId::new(),
            customer_id: CustomerId::new(),
            conversation_id: ConversationId::new(),
            items,
            phone_number: "99112233".to_string(),
            address: "БЗД 14-р хороо".to_string(),
            has_delivery: true,
            status: OrderStatus::Pending,
            total_amount: Decimal::from(123),
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Cash,
            payment_details: PaymentDetails::default(),
            ai_extraction: AiExtraction {
                raw_message: "2 ширхэг хар цамц".to_string(),
                confidence: 0.9,
                needs_review: false,
            },
            notes: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn recompute_total_overrides_prior_values() {
        let mut order = order(vec![
            OrderItem {
                name: "хар цамц".to_string(),
                quantity: 2,
                price: Decimal::from(45_000),
                subtotal: Decimal::ZERO,
            },
            OrderItem {
                name: "хар өмд".to_string(),
                quantity: 1,
                price: Decimal::from(55_000),
                subtotal: Decimal::from(1),
            },
        ]);

        order.recompute_total();

        assert_eq!(order.items[0].subtotal, Decimal::from(90_000));
        assert_eq!(order.items[1].subtotal, Decimal::from(55_000));
        assert_eq!(order.total_amount, Decimal::from(145_000));
    }

    #[test]
    fn empty_order_recomputes_to_zero() {
        let mut order = order(Vec::new());
        order.recompute_total();
        assert_eq!(order.total_amount, Decimal::ZERO);
    }

    #[test]
    fn cancellation_is_reachable_from_any_state() {
        let mut order = order(Vec::new());
        order.transition_to(OrderStatus::Confirmed).expect("pending -> confirmed");
        order.transition_to(OrderStatus::Cancelled).expect("confirmed -> cancelled");
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn skipping_lifecycle_stages_is_rejected() {
        let mut order = order(Vec::new());
        let error = order
            .transition_to(OrderStatus::Delivered)
            .expect_err("pending -> delivered should fail");
        assert!(matches!(
            error,
            crate::errors::DomainError::InvalidOrderTransition { .. }
        ));
    }
}
