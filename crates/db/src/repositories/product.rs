use sqlx::{sqlite::SqliteRow, Row};

use shopbot_core::domain::product::{Product, ProductId, ProductKey};
use shopbot_core::domain::store::StoreId;

use super::{
    parse_decimal, parse_json, parse_timestamp, parse_uuid, to_json, ProductRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str =
    "id, store_id, name, category, description, price, stock, is_active, attributes, updated_at";

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn active_for_store(&self, store_id: &StoreId) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS}
             FROM products
             WHERE store_id = ? AND is_active = 1
             ORDER BY rowid ASC"
        ))
        .bind(store_id.0.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(product_from_row).collect()
    }

    async fn all_for_store(&self, store_id: &StoreId) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS}
             FROM products
             WHERE store_id = ?
             ORDER BY rowid ASC"
        ))
        .bind(store_id.0.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(product_from_row).collect()
    }

    async fn find_by_key(&self, key: &ProductKey) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS}
             FROM products
             WHERE store_id = ? AND name = ? AND category = ?"
        ))
        .bind(key.store_id.0.to_string())
        .bind(&key.name)
        .bind(&key.category)
        .fetch_optional(&self.pool)
        .await?;

        row.map(product_from_row).transpose()
    }

    async fn upsert(&self, product: Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO products (
                id, store_id, name, category, description, price, stock, is_active,
                attributes, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(store_id, name, category) DO UPDATE SET
                description = excluded.description,
                price = excluded.price,
                stock = excluded.stock,
                is_active = excluded.is_active,
                attributes = excluded.attributes,
                updated_at = excluded.updated_at",
        )
        .bind(product.id.0.to_string())
        .bind(product.store_id.0.to_string())
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.description.as_deref())
        .bind(product.price.to_string())
        .bind(product.stock)
        .bind(product.is_active)
        .bind(to_json("attributes", &product.attributes)?)
        .bind(product.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn deactivate(&self, id: &ProductId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE products SET is_active = 0 WHERE id = ?")
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn adjust_stock(&self, id: &ProductId, delta: i64) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE products SET stock = MAX(stock + ?, 0) WHERE id = ?")
            .bind(delta)
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn product_from_row(row: SqliteRow) -> Result<Product, RepositoryError> {
    Ok(Product {
        id: ProductId(parse_uuid("id", row.try_get("id")?)?),
        store_id: StoreId(parse_uuid("store_id", row.try_get("store_id")?)?),
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        description: row.try_get("description")?,
        price: parse_decimal("price", row.try_get("price")?)?,
        stock: row.try_get("stock")?,
        is_active: row.try_get("is_active")?,
        attributes: parse_json("attributes", row.try_get("attributes")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use shopbot_core::domain::product::{Product, ProductId};
    use shopbot_core::domain::store::{ColumnMapping, Store, StoreId};

    use super::SqlProductRepository;
    use crate::migrations;
    use crate::repositories::{ProductRepository, SqlStoreRepository, StoreRepository};
    use crate::{connect_with_settings, DbPool};

    async fn setup() -> (DbPool, StoreId) {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");

        let store = Store {
            id: StoreId::new(),
            name: "Shop".to_string(),
            channel_ids: vec!["page-1".to_string()],
            spreadsheet_id: Some("sheet-1".to_string()),
            has_delivery: false,
            pickup_address: None,
            accepts_invoicing: false,
            persona: String::new(),
            column_mapping: ColumnMapping::default(),
            currency: "MNT".to_string(),
            is_active: true,
        };
        SqlStoreRepository::new(pool.clone()).save(store.clone()).await.expect("save store");

        (pool, store.id)
    }

    fn product(store_id: StoreId, name: &str, price: i64, stock: i64) -> Product {
        Product {
            id: ProductId::new(),
            store_id,
            name: name.to_string(),
            category: String::new(),
            description: None,
            price: Decimal::from(price),
            stock,
            is_active: true,
            attributes: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_by_composite_key_preserves_the_original_id() {
        let (pool, store_id) = setup().await;
        let repo = SqlProductRepository::new(pool.clone());

        let original = product(store_id, "хар цамц", 45_000, 10);
        repo.upsert(original.clone()).await.expect("insert");

        let mut updated = product(store_id, "хар цамц", 50_000, 7);
        updated.attributes.insert("Өнгө".to_string(), "Хар".to_string());
        repo.upsert(updated).await.expect("update");

        let found = repo
            .find_by_key(&original.key())
            .await
            .expect("find by key")
            .expect("product exists");
        assert_eq!(found.id, original.id);
        assert_eq!(found.price, Decimal::from(50_000));
        assert_eq!(found.stock, 7);
        assert_eq!(found.attributes.get("Өнгө").map(String::as_str), Some("Хар"));

        pool.close().await;
    }

    #[tokio::test]
    async fn deactivated_products_are_excluded_from_the_active_catalog() {
        let (pool, store_id) = setup().await;
        let repo = SqlProductRepository::new(pool.clone());

        let keep = product(store_id, "хар цамц", 45_000, 10);
        let drop = product(store_id, "улаан даашинз", 75_000, 5);
        repo.upsert(keep.clone()).await.expect("insert keep");
        repo.upsert(drop.clone()).await.expect("insert drop");

        repo.deactivate(&drop.id).await.expect("deactivate");

        let active = repo.active_for_store(&store_id).await.expect("active");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "хар цамц");

        let all = repo.all_for_store(&store_id).await.expect("all");
        assert_eq!(all.len(), 2);

        pool.close().await;
    }

    #[tokio::test]
    async fn stock_adjustments_clamp_at_zero() {
        let (pool, store_id) = setup().await;
        let repo = SqlProductRepository::new(pool.clone());

        let item = product(store_id, "хар өмд", 55_000, 2);
        repo.upsert(item.clone()).await.expect("insert");

        repo.adjust_stock(&item.id, -5).await.expect("adjust");

        let found =
            repo.find_by_key(&item.key()).await.expect("find").expect("product exists");
        assert_eq!(found.stock, 0);

        pool.close().await;
    }
}
