use sqlx::{sqlite::SqliteRow, Row};

use shopbot_core::domain::store::{Store, StoreId};

use super::{parse_json, parse_uuid, to_json, RepositoryError, StoreRepository};
use crate::DbPool;

pub struct SqlStoreRepository {
    pool: DbPool,
}

impl SqlStoreRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, name, channel_ids, spreadsheet_id, has_delivery, \
     pickup_address, accepts_invoicing, persona, column_mapping, currency, is_active";

#[async_trait::async_trait]
impl StoreRepository for SqlStoreRepository {
    async fn find_by_channel_id(
        &self,
        channel_id: &str,
    ) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS}
             FROM stores
             WHERE is_active = 1
               AND EXISTS (
                   SELECT 1 FROM json_each(stores.channel_ids) WHERE json_each.value = ?
               )"
        ))
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(store_from_row).transpose()
    }

    async fn find_by_id(&self, id: &StoreId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM stores WHERE id = ?"))
            .bind(id.0.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(store_from_row).transpose()
    }

    async fn save(&self, store: Store) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO stores (
                id, name, channel_ids, spreadsheet_id, has_delivery, pickup_address,
                accepts_invoicing, persona, column_mapping, currency, is_active
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                channel_ids = excluded.channel_ids,
                spreadsheet_id = excluded.spreadsheet_id,
                has_delivery = excluded.has_delivery,
                pickup_address = excluded.pickup_address,
                accepts_invoicing = excluded.accepts_invoicing,
                persona = excluded.persona,
                column_mapping = excluded.column_mapping,
                currency = excluded.currency,
                is_active = excluded.is_active",
        )
        .bind(store.id.0.to_string())
        .bind(&store.name)
        .bind(to_json("channel_ids", &store.channel_ids)?)
        .bind(store.spreadsheet_id.as_deref())
        .bind(store.has_delivery)
        .bind(store.pickup_address.as_deref())
        .bind(store.accepts_invoicing)
        .bind(&store.persona)
        .bind(to_json("column_mapping", &store.column_mapping)?)
        .bind(&store.currency)
        .bind(store.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn store_from_row(row: SqliteRow) -> Result<Store, RepositoryError> {
    Ok(Store {
        id: StoreId(parse_uuid("id", row.try_get("id")?)?),
        name: row.try_get("name")?,
        channel_ids: parse_json("channel_ids", row.try_get("channel_ids")?)?,
        spreadsheet_id: row.try_get("spreadsheet_id")?,
        has_delivery: row.try_get("has_delivery")?,
        pickup_address: row.try_get("pickup_address")?,
        accepts_invoicing: row.try_get("accepts_invoicing")?,
        persona: row.try_get("persona")?,
        column_mapping: parse_json("column_mapping", row.try_get("column_mapping")?)?,
        currency: row.try_get("currency")?,
        is_active: row.try_get("is_active")?,
    })
}
