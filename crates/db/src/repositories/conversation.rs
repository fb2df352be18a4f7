use sqlx::{sqlite::SqliteRow, Row};

use shopbot_core::domain::conversation::{Conversation, ConversationId, ConversationStatus, Intent};
use shopbot_core::domain::customer::CustomerId;
use shopbot_core::domain::store::StoreId;

use super::{
    parse_json, parse_timestamp, parse_uuid, to_json, ConversationRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, store_id, customer_id, channel_conversation_id, messages, \
     status, current_intent, is_manual_mode, order_ids, seen_message_ids, last_activity, \
     created_at";

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn find_or_create(
        &self,
        store_id: StoreId,
        customer_id: CustomerId,
        channel_conversation_id: &str,
    ) -> Result<Conversation, RepositoryError> {
        // Insert-or-ignore then re-select. The unique (store_id,
        // channel_conversation_id) constraint makes concurrent callers
        // converge on one row.
        let fresh = Conversation::new(store_id, customer_id, channel_conversation_id);
        sqlx::query(
            "INSERT INTO conversations (
                id, store_id, customer_id, channel_conversation_id, messages, status,
                current_intent, is_manual_mode, order_ids, seen_message_ids,
                last_activity, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(store_id, channel_conversation_id) DO NOTHING",
        )
        .bind(fresh.id.0.to_string())
        .bind(fresh.store_id.0.to_string())
        .bind(fresh.customer_id.0.to_string())
        .bind(&fresh.channel_conversation_id)
        .bind(to_json("messages", &fresh.messages)?)
        .bind(fresh.status.as_str())
        .bind(fresh.current_intent.as_str())
        .bind(fresh.is_manual_mode)
        .bind(to_json("order_ids", &fresh.order_ids)?)
        .bind(to_json("seen_message_ids", &fresh.seen_message_ids)?)
        .bind(fresh.last_activity.to_rfc3339())
        .bind(fresh.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS}
             FROM conversations
             WHERE store_id = ? AND channel_conversation_id = ?"
        ))
        .bind(store_id.0.to_string())
        .bind(channel_conversation_id)
        .fetch_one(&self.pool)
        .await?;

        conversation_from_row(row)
    }

    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM conversations WHERE id = ?"))
                .bind(id.0.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(conversation_from_row).transpose()
    }

    async fn save(&self, conversation: Conversation) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE conversations SET
                messages = ?,
                status = ?,
                current_intent = ?,
                is_manual_mode = ?,
                order_ids = ?,
                seen_message_ids = ?,
                last_activity = ?
             WHERE id = ?",
        )
        .bind(to_json("messages", &conversation.messages)?)
        .bind(conversation.status.as_str())
        .bind(conversation.current_intent.as_str())
        .bind(conversation.is_manual_mode)
        .bind(to_json("order_ids", &conversation.order_ids)?)
        .bind(to_json("seen_message_ids", &conversation.seen_message_ids)?)
        .bind(conversation.last_activity.to_rfc3339())
        .bind(conversation.id.0.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn conversation_from_row(row: SqliteRow) -> Result<Conversation, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = ConversationStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown conversation status `{status_raw}`"))
    })?;

    let intent_raw = row.try_get::<String, _>("current_intent")?;
    let current_intent = Intent::parse(&intent_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown intent `{intent_raw}`")))?;

    Ok(Conversation {
        id: ConversationId(parse_uuid("id", row.try_get("id")?)?),
        store_id: StoreId(parse_uuid("store_id", row.try_get("store_id")?)?),
        customer_id: CustomerId(parse_uuid("customer_id", row.try_get("customer_id")?)?),
        channel_conversation_id: row.try_get("channel_conversation_id")?,
        messages: parse_json("messages", row.try_get("messages")?)?,
        status,
        current_intent,
        is_manual_mode: row.try_get("is_manual_mode")?,
        order_ids: parse_json("order_ids", row.try_get("order_ids")?)?,
        seen_message_ids: parse_json("seen_message_ids", row.try_get("seen_message_ids")?)?,
        last_activity: parse_timestamp("last_activity", row.try_get("last_activity")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use shopbot_core::domain::conversation::{ConversationStatus, MessageSender};
    use shopbot_core::domain::customer::Customer;
    use shopbot_core::domain::store::{ColumnMapping, Store, StoreId};

    use super::SqlConversationRepository;
    use crate::migrations;
    use crate::repositories::{
        ConversationRepository, CustomerRepository, SqlCustomerRepository, SqlStoreRepository,
        StoreRepository,
    };
    use crate::{connect_with_settings, DbPool};

    async fn setup() -> (DbPool, Store, Customer) {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");

        let store = Store {
            id: StoreId::new(),
            name: "Shop".to_string(),
            channel_ids: vec!["page-1".to_string()],
            spreadsheet_id: None,
            has_delivery: true,
            pickup_address: None,
            accepts_invoicing: false,
            persona: String::new(),
            column_mapping: ColumnMapping::default(),
            currency: "MNT".to_string(),
            is_active: true,
        };
        SqlStoreRepository::new(pool.clone()).save(store.clone()).await.expect("save store");

        let customer = Customer::new("psid-1", "Бат");
        SqlCustomerRepository::new(pool.clone())
            .save(customer.clone())
            .await
            .expect("save customer");

        (pool, store, customer)
    }

    #[tokio::test]
    async fn find_or_create_is_idempotent_per_store_and_channel() {
        let (pool, store, customer) = setup().await;
        let repo = SqlConversationRepository::new(pool.clone());

        let first =
            repo.find_or_create(store.id, customer.id, "psid-1").await.expect("first call");
        let second =
            repo.find_or_create(store.id, customer.id, "psid-1").await.expect("second call");

        assert_eq!(first.id, second.id);

        pool.close().await;
    }

    #[tokio::test]
    async fn saved_state_survives_a_round_trip() {
        let (pool, store, customer) = setup().await;
        let repo = SqlConversationRepository::new(pool.clone());

        let mut convo =
            repo.find_or_create(store.id, customer.id, "psid-1").await.expect("create");
        convo.add_message(MessageSender::Customer, "Сайн байна уу", None);
        convo.add_message(MessageSender::Bot, "Сайн байна уу! 😊", None);
        convo.record_message_id("mid.1");
        convo.transition_to(ConversationStatus::WaitingForInfo).expect("transition");
        repo.save(convo.clone()).await.expect("save");

        let found = repo.find_by_id(&convo.id).await.expect("find").expect("exists");
        assert_eq!(found, convo);
        assert!(!found.clone().record_message_id("mid.1"), "seen ids persist");

        pool.close().await;
    }
}
