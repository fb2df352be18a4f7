pub mod assembler;
pub mod ingress;
pub mod locks;
pub mod payment;

pub use assembler::{assemble_order, OrderDraft};
pub use ingress::Pipeline;
pub use locks::ConversationLocks;
pub use payment::{FailingPaymentClient, Invoice, PaymentClient, PaymentError, SimulatedPaymentClient};
