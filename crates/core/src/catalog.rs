use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{Product, ProductId};
use crate::extraction::ExtractedItem;

/// One consistent view of a store's active catalog, fetched once per
/// extraction+validation pass and never re-fetched mid-pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CatalogSnapshot {
    products: Vec<Product>,
}

impl CatalogSnapshot {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Product> {
        self.products.iter().find(|product| product.name == name)
    }
}

/// An extracted line item matched to a catalog product, priced from the
/// catalog record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidatedItem {
    pub product_id: ProductId,
    pub canonical_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchOutcome {
    pub validated: Vec<ValidatedItem>,
    pub unknown: Vec<String>,
}

impl MatchOutcome {
    /// All-or-nothing: any unmatched item aborts the entire order attempt.
    pub fn is_complete(&self) -> bool {
        self.unknown.is_empty() && !self.validated.is_empty()
    }

    pub fn total_amount(&self) -> Decimal {
        self.validated
            .iter()
            .map(|item| item.unit_price * Decimal::from(item.quantity))
            .sum()
    }
}

/// Validates extracted items against the catalog snapshot.
///
/// Matching policy: a product matches when its canonical name
/// case-insensitively contains or is contained by the extracted name, or the
/// two share a token longer than two characters. The first qualifying product
/// in catalog iteration order wins; there is no edit-distance ranking. Good
/// enough for tens-of-items per-store catalogs.
pub fn validate_items(items: &[ExtractedItem], catalog: &CatalogSnapshot) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    for item in items {
        match match_product(&item.name, catalog.products()) {
            Some(product) => outcome.validated.push(ValidatedItem {
                product_id: product.id,
                canonical_name: product.name.clone(),
                quantity: item.quantity,
                unit_price: product.price,
            }),
            None => outcome.unknown.push(item.name.clone()),
        }
    }

    outcome
}

fn match_product<'a>(mention: &str, products: &'a [Product]) -> Option<&'a Product> {
    let mention_lower = mention.to_lowercase();
    let mention_tokens = tokens(&mention_lower);

    products.iter().find(|product| {
        let name_lower = product.name.to_lowercase();
        if name_lower.contains(&mention_lower) || mention_lower.contains(&name_lower) {
            return true;
        }
        tokens(&name_lower)
            .iter()
            .any(|token| token.chars().count() > 2 && mention_tokens.contains(token))
    })
}

fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}
