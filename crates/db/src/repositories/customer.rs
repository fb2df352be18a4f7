use sqlx::{sqlite::SqliteRow, Row};

use shopbot_core::domain::customer::{Customer, CustomerId};

use super::{parse_timestamp, parse_uuid, CustomerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn find_by_channel_id(
        &self,
        channel_id: &str,
    ) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, channel_id, name, phone_number, address, first_seen, last_seen
             FROM customers
             WHERE channel_id = ?",
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(customer_from_row).transpose()
    }

    async fn save(&self, customer: Customer) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO customers (
                id, channel_id, name, phone_number, address, first_seen, last_seen
             ) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(channel_id) DO UPDATE SET
                name = excluded.name,
                phone_number = excluded.phone_number,
                address = excluded.address,
                last_seen = excluded.last_seen",
        )
        .bind(customer.id.0.to_string())
        .bind(&customer.channel_id)
        .bind(&customer.name)
        .bind(customer.phone_number.as_deref())
        .bind(customer.address.as_deref())
        .bind(customer.first_seen.to_rfc3339())
        .bind(customer.last_seen.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn customer_from_row(row: SqliteRow) -> Result<Customer, RepositoryError> {
    Ok(Customer {
        id: CustomerId(parse_uuid("id", row.try_get("id")?)?),
        channel_id: row.try_get("channel_id")?,
        name: row.try_get("name")?,
        phone_number: row.try_get("phone_number")?,
        address: row.try_get("address")?,
        first_seen: parse_timestamp("first_seen", row.try_get("first_seen")?)?,
        last_seen: parse_timestamp("last_seen", row.try_get("last_seen")?)?,
    })
}

#[cfg(test)]
mod tests {
    use shopbot_core::domain::customer::Customer;

    use super::SqlCustomerRepository;
    use crate::migrations;
    use crate::repositories::CustomerRepository;
    use crate::{connect_with_settings, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    #[tokio::test]
    async fn resaving_by_channel_id_updates_profile_and_keeps_identity() {
        let pool = setup_pool().await;
        let repo = SqlCustomerRepository::new(pool.clone());

        let customer = Customer::new("psid-1", "Хэрэглэгч");
        repo.save(customer.clone()).await.expect("save customer");

        let mut enriched = customer.clone();
        enriched.name = "Бат".to_string();
        enriched.phone_number = Some("99112233".to_string());
        repo.save(enriched).await.expect("re-save customer");

        let found =
            repo.find_by_channel_id("psid-1").await.expect("lookup").expect("customer exists");
        assert_eq!(found.id, customer.id);
        assert_eq!(found.name, "Бат");
        assert_eq!(found.phone_number.as_deref(), Some("99112233"));

        pool.close().await;
    }
}
