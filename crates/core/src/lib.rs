pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod extraction;

pub use catalog::{CatalogSnapshot, MatchOutcome, ValidatedItem};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::conversation::{
    Conversation, ConversationId, ConversationStatus, Intent, Message, MessageSender,
};
pub use domain::customer::{Customer, CustomerId};
pub use domain::order::{
    AiExtraction, Order, OrderId, OrderItem, OrderStatus, PaymentDetails, PaymentMethod,
    PaymentStatus,
};
pub use domain::product::{Product, ProductId, ProductKey};
pub use domain::store::{ColumnMapping, Store, StoreId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use extraction::{ExtractedItem, ExtractionIntent, ExtractionResult, ORDER_CONFIDENCE_THRESHOLD};
