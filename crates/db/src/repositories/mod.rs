use async_trait::async_trait;
use thiserror::Error;

use shopbot_core::domain::conversation::{Conversation, ConversationId};
use shopbot_core::domain::customer::{Customer, CustomerId};
use shopbot_core::domain::order::{Order, OrderId};
use shopbot_core::domain::product::{Product, ProductId, ProductKey};
use shopbot_core::domain::store::{Store, StoreId};

pub mod conversation;
pub mod customer;
pub mod memory;
pub mod order;
pub mod product;
pub mod store;

pub use conversation::SqlConversationRepository;
pub use customer::SqlCustomerRepository;
pub use memory::{
    InMemoryConversationRepository, InMemoryCustomerRepository, InMemoryOrderRepository,
    InMemoryProductRepository, InMemoryStoreRepository,
};
pub use order::SqlOrderRepository;
pub use product::SqlProductRepository;
pub use store::SqlStoreRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

pub(crate) fn parse_uuid(column: &str, value: String) -> Result<uuid::Uuid, RepositoryError> {
    uuid::Uuid::parse_str(&value)
        .map_err(|error| RepositoryError::Decode(format!("invalid uuid in `{column}`: {error}")))
}

pub(crate) fn parse_timestamp(
    column: &str,
    value: String,
) -> Result<chrono::DateTime<chrono::Utc>, RepositoryError> {
    chrono::DateTime::parse_from_rfc3339(&value)
        .map(|timestamp| timestamp.with_timezone(&chrono::Utc))
        .map_err(|error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        })
}

pub(crate) fn parse_decimal(
    column: &str,
    value: String,
) -> Result<rust_decimal::Decimal, RepositoryError> {
    value.parse().map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    column: &str,
    value: String,
) -> Result<T, RepositoryError> {
    serde_json::from_str(&value)
        .map_err(|error| RepositoryError::Decode(format!("invalid json in `{column}`: {error}")))
}

pub(crate) fn to_json<T: serde::Serialize>(
    column: &str,
    value: &T,
) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|error| {
        RepositoryError::Decode(format!("could not encode `{column}` as json: {error}"))
    })
}

#[async_trait]
pub trait StoreRepository: Send + Sync {
    /// Resolves the store whose channel id list contains `channel_id`.
    async fn find_by_channel_id(&self, channel_id: &str)
        -> Result<Option<Store>, RepositoryError>;
    async fn find_by_id(&self, id: &StoreId) -> Result<Option<Store>, RepositoryError>;
    async fn save(&self, store: Store) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_channel_id(
        &self,
        channel_id: &str,
    ) -> Result<Option<Customer>, RepositoryError>;
    async fn save(&self, customer: Customer) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Atomic find-or-create keyed on (store, channel conversation id).
    /// Concurrent callers for the same pair must observe a single row.
    async fn find_or_create(
        &self,
        store_id: StoreId,
        customer_id: CustomerId,
        channel_conversation_id: &str,
    ) -> Result<Conversation, RepositoryError>;

    async fn find_by_id(&self, id: &ConversationId)
        -> Result<Option<Conversation>, RepositoryError>;

    async fn save(&self, conversation: Conversation) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn active_for_store(&self, store_id: &StoreId) -> Result<Vec<Product>, RepositoryError>;
    async fn all_for_store(&self, store_id: &StoreId) -> Result<Vec<Product>, RepositoryError>;
    async fn find_by_key(&self, key: &ProductKey) -> Result<Option<Product>, RepositoryError>;

    /// Inserts the product or, when (store, name, category) already exists,
    /// updates price, stock, description, attributes, and reactivates it.
    /// The existing row keeps its id.
    async fn upsert(&self, product: Product) -> Result<(), RepositoryError>;

    async fn deactivate(&self, id: &ProductId) -> Result<(), RepositoryError>;

    /// Applies `delta` to the stock level, clamping at zero.
    async fn adjust_stock(&self, id: &ProductId, delta: i64) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Most recent orders first, used for order-status context.
    async fn recent_for_customer(
        &self,
        customer_id: &CustomerId,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError>;

    async fn save(&self, order: Order) -> Result<(), RepositoryError>;
}
