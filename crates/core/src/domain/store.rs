use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreId(pub Uuid);

impl StoreId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StoreId {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps logical product fields to spreadsheet column headers. Any key left
/// unset falls back to the fixed default header for that field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub name: Option<String>,
    pub price: Option<String>,
    pub stock: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl ColumnMapping {
    pub const DEFAULT_NAME: &'static str = "Нэр";
    pub const DEFAULT_PRICE: &'static str = "Үнэ";
    pub const DEFAULT_STOCK: &'static str = "Үлдэгдэл";

    pub fn name_column(&self) -> &str {
        self.name.as_deref().unwrap_or(Self::DEFAULT_NAME)
    }

    pub fn price_column(&self) -> &str {
        self.price.as_deref().unwrap_or(Self::DEFAULT_PRICE)
    }

    pub fn stock_column(&self) -> &str {
        self.stock.as_deref().unwrap_or(Self::DEFAULT_STOCK)
    }

    pub fn category_column(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

/// Tenant boundary. A store owns its channel identifiers, catalog, delivery
/// and payment policy, and the persona text fed to the extraction oracle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    /// Channel identifiers (e.g. page ids) that route inbound events to this
    /// store. One store may own several.
    pub channel_ids: Vec<String>,
    pub spreadsheet_id: Option<String>,
    pub has_delivery: bool,
    pub pickup_address: Option<String>,
    pub accepts_invoicing: bool,
    /// Persona text embedded in oracle prompts.
    pub persona: String,
    pub column_mapping: ColumnMapping,
    pub currency: String,
    pub is_active: bool,
}

impl Store {
    pub fn owns_channel(&self, channel_id: &str) -> bool {
        self.channel_ids.iter().any(|id| id == channel_id)
    }

    /// The address recorded on pickup-only orders.
    pub fn pickup_address_or_default(&self) -> String {
        self.pickup_address.clone().unwrap_or_else(|| "Очиж авах".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnMapping, Store, StoreId};

    fn store() -> Store {
        Store {
            id: StoreId::new(),
            name: "Test Shop".to_string(),
            channel_ids: vec!["page-1".to_string(), "page-2".to_string()],
            spreadsheet_id: None,
            has_delivery: true,
            pickup_address: None,
            accepts_invoicing: true,
            persona: "Найрсаг, тусламтгай.".to_string(),
            column_mapping: ColumnMapping::default(),
            currency: "MNT".to_string(),
            is_active: true,
        }
    }

    #[test]
    fn multiple_channel_identifiers_route_to_one_store() {
        let store = store();
        assert!(store.owns_channel("page-1"));
        assert!(store.owns_channel("page-2"));
        assert!(!store.owns_channel("page-3"));
    }

    #[test]
    fn unmapped_columns_fall_back_to_default_headers() {
        let mapping = ColumnMapping { price: Some("Price".to_string()), ..Default::default() };
        assert_eq!(mapping.name_column(), "Нэр");
        assert_eq!(mapping.price_column(), "Price");
        assert_eq!(mapping.stock_column(), "Үлдэгдэл");
        assert_eq!(mapping.category_column(), None);
    }
}
