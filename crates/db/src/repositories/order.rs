use sqlx::{sqlite::SqliteRow, Row};

use shopbot_core::domain::conversation::ConversationId;
use shopbot_core::domain::customer::CustomerId;
use shopbot_core::domain::order::{Order, OrderId, OrderStatus, PaymentMethod, PaymentStatus};
use shopbot_core::domain::store::StoreId;

use super::{
    parse_decimal, parse_json, parse_timestamp, parse_uuid, to_json, OrderRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, store_id, customer_id, conversation_id, items, phone_number, \
     address, has_delivery, status, total_amount, payment_status, payment_method, \
     payment_details, ai_extraction, notes, created_at";

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM orders WHERE id = ?"))
            .bind(id.0.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(order_from_row).transpose()
    }

    async fn recent_for_customer(
        &self,
        customer_id: &CustomerId,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS}
             FROM orders
             WHERE customer_id = ?
             ORDER BY created_at DESC
             LIMIT ?"
        ))
        .bind(customer_id.0.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(order_from_row).collect()
    }

    async fn save(&self, order: Order) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO orders (
                id, store_id, customer_id, conversation_id, items, phone_number, address,
                has_delivery, status, total_amount, payment_status, payment_method,
                payment_details, ai_extraction, notes, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                items = excluded.items,
                phone_number = excluded.phone_number,
                address = excluded.address,
                has_delivery = excluded.has_delivery,
                status = excluded.status,
                total_amount = excluded.total_amount,
                payment_status = excluded.payment_status,
                payment_method = excluded.payment_method,
                payment_details = excluded.payment_details,
                notes = excluded.notes",
        )
        .bind(order.id.0.to_string())
        .bind(order.store_id.0.to_string())
        .bind(order.customer_id.0.to_string())
        .bind(order.conversation_id.0.to_string())
        .bind(to_json("items", &order.items)?)
        .bind(&order.phone_number)
        .bind(&order.address)
        .bind(order.has_delivery)
        .bind(order.status.as_str())
        .bind(order.total_amount.to_string())
        .bind(order.payment_status.as_str())
        .bind(order.payment_method.as_str())
        .bind(to_json("payment_details", &order.payment_details)?)
        .bind(to_json("ai_extraction", &order.ai_extraction)?)
        .bind(order.notes.as_deref())
        .bind(order.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn order_from_row(row: SqliteRow) -> Result<Order, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = OrderStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown order status `{status_raw}`")))?;

    let payment_status_raw = row.try_get::<String, _>("payment_status")?;
    let payment_status = PaymentStatus::parse(&payment_status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown payment status `{payment_status_raw}`"))
    })?;

    let payment_method_raw = row.try_get::<String, _>("payment_method")?;
    let payment_method = PaymentMethod::parse(&payment_method_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown payment method `{payment_method_raw}`"))
    })?;

    Ok(Order {
        id: OrderId(parse_uuid("id", row.try_get("id")?)?),
        store_id: StoreId(parse_uuid("store_id", row.try_get("store_id")?)?),
        customer_id: CustomerId(parse_uuid("customer_id", row.try_get("customer_id")?)?),
        conversation_id: ConversationId(parse_uuid(
            "conversation_id",
            row.try_get("conversation_id")?,
        )?),
        items: parse_json("items", row.try_get("items")?)?,
        phone_number: row.try_get("phone_number")?,
        address: row.try_get("address")?,
        has_delivery: row.try_get("has_delivery")?,
        status,
        total_amount: parse_decimal("total_amount", row.try_get("total_amount")?)?,
        payment_status,
        payment_method,
        payment_details: parse_json("payment_details", row.try_get("payment_details")?)?,
        ai_extraction: parse_json("ai_extraction", row.try_get("ai_extraction")?)?,
        notes: row.try_get("notes")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use shopbot_core::domain::customer::Customer;
    use shopbot_core::domain::order::{
        AiExtraction, Order, OrderId, OrderItem, OrderStatus, PaymentDetails, PaymentMethod,
        PaymentStatus,
    };
    use shopbot_core::domain::store::{ColumnMapping, Store, StoreId};

    use super::SqlOrderRepository;
    use crate::migrations;
    use crate::repositories::{
        ConversationRepository, CustomerRepository, OrderRepository, SqlConversationRepository,
        SqlCustomerRepository, SqlStoreRepository, StoreRepository,
    };
    use crate::{connect_with_settings, DbPool};

    async fn setup() -> (DbPool, Order) {
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
            accepts_invoicing: true,
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

        let conversation = SqlConversationRepository::new(pool.clone())
            .find_or_create(store.id, customer.id, "psid-1")
            .await
            .expect("create conversation");

        let order = Order {
            id: OrderId::new(),
            store_id: store.id,
            customer_id: customer.id,
            conversation_id: conversation.id,
            items: vec![OrderItem {
                name: "хар цамц".to_string(),
                quantity: 2,
                price: Decimal::from(45_000),
                subtotal: Decimal::from(90_000),
            }],
            phone_number: "99112233".to_string(),
            address: "БЗД 14-р хороо".to_string(),
            has_delivery: true,
            status: OrderStatus::Pending,
            total_amount: Decimal::from(90_000),
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Cash,
            payment_details: PaymentDetails::default(),
            ai_extraction: AiExtraction {
                raw_message: "2 ширхэг хар цамц авъя".to_string(),
                confidence: 0.9,
                needs_review: false,
            },
            notes: None,
            created_at: Utc::now(),
        };

        (pool, order)
    }

    #[tokio::test]
    async fn order_round_trip_preserves_items_and_extraction_audit() {
        let (pool, order) = setup().await;
        let repo = SqlOrderRepository::new(pool.clone());

        repo.save(order.clone()).await.expect("save order");
        let found = repo.find_by_id(&order.id).await.expect("find").expect("order exists");

        assert_eq!(found, order);

        pool.close().await;
    }

    #[tokio::test]
    async fn recent_orders_are_newest_first_and_limited() {
        let (pool, order) = setup().await;
        let repo = SqlOrderRepository::new(pool.clone());

        for index in 0..4 {
            let mut entry = order.clone();
            entry.id = OrderId::new();
            entry.created_at = order.created_at + Duration::seconds(index);
            entry.notes = Some(format!("order-{index}"));
            repo.save(entry).await.expect("save order");
        }

        let recent =
            repo.recent_for_customer(&order.customer_id, 3).await.expect("recent orders");
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].notes.as_deref(), Some("order-3"));
        assert_eq!(recent[2].notes.as_deref(), Some("order-1"));

        pool.close().await;
    }
}
