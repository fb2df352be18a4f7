use std::collections::HashMap;

use tokio::sync::RwLock;

use shopbot_core::domain::conversation::{Conversation, ConversationId};
use shopbot_core::domain::customer::{Customer, CustomerId};
use shopbot_core::domain::order::{Order, OrderId};
use shopbot_core::domain::product::{Product, ProductId, ProductKey};
use shopbot_core::domain::store::{Store, StoreId};

use super::{
    ConversationRepository, CustomerRepository, OrderRepository, ProductRepository,
    RepositoryError, StoreRepository,
};

#[derive(Default)]
pub struct InMemoryStoreRepository {
    stores: RwLock<HashMap<StoreId, Store>>,
}

#[async_trait::async_trait]
impl StoreRepository for InMemoryStoreRepository {
    async fn find_by_channel_id(
        &self,
        channel_id: &str,
    ) -> Result<Option<Store>, RepositoryError> {
        let stores = self.stores.read().await;
        Ok(stores
            .values()
            .find(|store| store.is_active && store.owns_channel(channel_id))
            .cloned())
    }

    async fn find_by_id(&self, id: &StoreId) -> Result<Option<Store>, RepositoryError> {
        let stores = self.stores.read().await;
        Ok(stores.get(id).cloned())
    }

    async fn save(&self, store: Store) -> Result<(), RepositoryError> {
        let mut stores = self.stores.write().await;
        stores.insert(store.id, store);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<HashMap<String, Customer>>,
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find_by_channel_id(
        &self,
        channel_id: &str,
    ) -> Result<Option<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers.get(channel_id).cloned())
    }

    async fn save(&self, customer: Customer) -> Result<(), RepositoryError> {
        let mut customers = self.customers.write().await;
        customers.insert(customer.channel_id.clone(), customer);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryConversationRepository {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn find_or_create(
        &self,
        store_id: StoreId,
        customer_id: CustomerId,
        channel_conversation_id: &str,
    ) -> Result<Conversation, RepositoryError> {
        // Look-up and insert happen under one write guard so concurrent
        // callers cannot both create a row for the same pair.
        let mut conversations = self.conversations.write().await;
        if let Some(existing) = conversations.values().find(|convo| {
            convo.store_id == store_id
                && convo.channel_conversation_id == channel_conversation_id
        }) {
            return Ok(existing.clone());
        }

        let fresh = Conversation::new(store_id, customer_id, channel_conversation_id);
        conversations.insert(fresh.id, fresh.clone());
        Ok(fresh)
    }

    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(id).cloned())
    }

    async fn save(&self, conversation: Conversation) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        conversations.insert(conversation.id, conversation);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryProductRepository {
    // Insertion order is catalog order; kept as a Vec for that reason.
    products: RwLock<Vec<Product>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn active_for_store(&self, store_id: &StoreId) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products
            .iter()
            .filter(|product| product.store_id == *store_id && product.is_active)
            .cloned()
            .collect())
    }

    async fn all_for_store(&self, store_id: &StoreId) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.iter().filter(|product| product.store_id == *store_id).cloned().collect())
    }

    async fn find_by_key(&self, key: &ProductKey) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.iter().find(|product| product.key() == *key).cloned())
    }

    async fn upsert(&self, product: Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        if let Some(existing) =
            products.iter_mut().find(|candidate| candidate.key() == product.key())
        {
            let id = existing.id;
            *existing = product;
            existing.id = id;
        } else {
            products.push(product);
        }
        Ok(())
    }

    async fn deactivate(&self, id: &ProductId) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        if let Some(product) = products.iter_mut().find(|product| product.id == *id) {
            product.is_active = false;
        }
        Ok(())
    }

    async fn adjust_stock(&self, id: &ProductId, delta: i64) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        if let Some(product) = products.iter_mut().find(|product| product.id == *id) {
            product.stock = (product.stock + delta).max(0);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<OrderId, Order>>,
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(id).cloned())
    }

    async fn recent_for_customer(
        &self,
        customer_id: &CustomerId,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut recent: Vec<Order> =
            orders.values().filter(|order| order.customer_id == *customer_id).cloned().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit as usize);
        Ok(recent)
    }

    async fn save(&self, order: Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id, order);
        Ok(())
    }
}
