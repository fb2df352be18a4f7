use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use shopbot_core::domain::order::{Order, PaymentStatus};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment provider error: {0}")]
    Provider(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Invoice {
    pub invoice_id: String,
    pub qr_payload: String,
}

/// Invoice provider seam. Invoice creation is best-effort: a failure here
/// never rolls back an already-persisted order.
#[async_trait]
pub trait PaymentClient: Send + Sync {
    async fn create_invoice(&self, order: &Order) -> Result<Invoice, PaymentError>;
    async fn check_status(&self, invoice_id: &str) -> Result<PaymentStatus, PaymentError>;
}

/// Deterministic local provider used until a real gateway is wired in.
pub struct SimulatedPaymentClient;

#[async_trait]
impl PaymentClient for SimulatedPaymentClient {
    async fn create_invoice(&self, order: &Order) -> Result<Invoice, PaymentError> {
        let invoice_id = format!("INV-{}", Uuid::new_v4().simple());
        Ok(Invoice {
            qr_payload: format!("qpay:{invoice_id}:{}", order.total_amount),
            invoice_id,
        })
    }

    async fn check_status(&self, _invoice_id: &str) -> Result<PaymentStatus, PaymentError> {
        Ok(PaymentStatus::Pending)
    }
}

/// Always fails; exercises the non-blocking invoice path.
pub struct FailingPaymentClient;

#[async_trait]
impl PaymentClient for FailingPaymentClient {
    async fn create_invoice(&self, _order: &Order) -> Result<Invoice, PaymentError> {
        Err(PaymentError::Provider("gateway unavailable".to_string()))
    }

    async fn check_status(&self, _invoice_id: &str) -> Result<PaymentStatus, PaymentError> {
        Err(PaymentError::Provider("gateway unavailable".to_string()))
    }
}
