use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::store::StoreId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub Uuid);

impl ProductId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

/// Composite identity key. Stable across reconciliation runs: two runs that
/// see the same (store, name, category) update the same record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductKey {
    pub store_id: StoreId,
    pub name: String,
    pub category: String,
}

impl ProductKey {
    pub fn new(store_id: StoreId, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self { store_id, name: name.into(), category: category.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i64,
    pub is_active: bool,
    /// Spreadsheet columns not claimed by the store's column mapping,
    /// preserved verbatim.
    pub attributes: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn key(&self) -> ProductKey {
        ProductKey::new(self.store_id, self.name.clone(), self.category.clone())
    }
}
