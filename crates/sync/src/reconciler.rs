use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use shopbot_core::domain::product::{Product, ProductId, ProductKey};
use shopbot_core::domain::store::Store;
use shopbot_core::errors::ApplicationError;
use shopbot_db::repositories::{ProductRepository, RepositoryError};

use crate::cooldown::CooldownLock;
use crate::sheets::{SheetsError, SpreadsheetClient};

/// Header of the optional status-feedback column. Never captured as a product
/// attribute.
pub const FEEDBACK_COLUMN: &str = "AI Status";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub upserted: usize,
    pub deactivated: usize,
    pub errors: usize,
}

/// Diffs a spreadsheet snapshot against the stored catalog: rows are upserted
/// by (store, name, category), and previously active products absent from the
/// snapshot are soft-deactivated. Runs for one store are bounded by a
/// store-keyed cooldown window.
pub struct Reconciler {
    products: Arc<dyn ProductRepository>,
    sheets: Arc<dyn SpreadsheetClient>,
    cooldown: Arc<CooldownLock>,
    write_feedback: bool,
}

impl Reconciler {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        sheets: Arc<dyn SpreadsheetClient>,
        cooldown: Arc<CooldownLock>,
        write_feedback: bool,
    ) -> Self {
        Self { products, sheets, cooldown, write_feedback }
    }

    pub async fn reconcile_store(&self, store: &Store) -> Result<SyncReport, ApplicationError> {
        let Some(spreadsheet_id) = store.spreadsheet_id.as_deref() else {
            return Err(ApplicationError::Configuration(format!(
                "store {} has no spreadsheet configured",
                store.id.0
            )));
        };

        self.cooldown.try_begin(store.id).await.map_err(|remaining| {
            ApplicationError::ConcurrencyRejection(format!(
                "catalog sync for store {} is cooling down for another {}ms",
                store.id.0,
                remaining.as_millis()
            ))
        })?;

        let headers = self.sheets.header_row(spreadsheet_id).await.map_err(external)?;
        let rows = self.sheets.rows(spreadsheet_id).await.map_err(external)?;

        let mapping = &store.column_mapping;
        let name_col = column_index(&headers, mapping.name_column()).ok_or_else(|| {
            ApplicationError::ExternalService(format!(
                "sheet has no `{}` column",
                mapping.name_column()
            ))
        })?;
        let price_col = column_index(&headers, mapping.price_column());
        let stock_col = column_index(&headers, mapping.stock_column());
        let category_col = mapping.category_column().and_then(|name| column_index(&headers, name));
        let description_col =
            mapping.description.as_deref().and_then(|name| column_index(&headers, name));
        let status_col = column_index(&headers, FEEDBACK_COLUMN);

        let claimed: HashSet<usize> = [Some(name_col), price_col, stock_col, category_col,
            description_col, status_col]
        .into_iter()
        .flatten()
        .collect();

        let mut report = SyncReport::default();
        let mut seen: HashSet<ProductKey> = HashSet::new();

        for (index, row) in rows.iter().enumerate() {
            let name = cell(row, Some(name_col)).trim();
            if name.is_empty() {
                // Spacer and section rows are expected, not errors.
                continue;
            }

            let attributes: BTreeMap<String, String> = headers
                .iter()
                .enumerate()
                .filter(|(column, _)| !claimed.contains(column))
                .filter_map(|(column, header)| {
                    let value = cell(row, Some(column)).trim();
                    (!value.is_empty()).then(|| (header.clone(), value.to_string()))
                })
                .collect();

            let product = Product {
                id: ProductId::new(),
                store_id: store.id,
                name: name.to_string(),
                category: cell(row, category_col).trim().to_string(),
                description: {
                    let text = cell(row, description_col).trim();
                    (!text.is_empty()).then(|| text.to_string())
                },
                price: Decimal::from(parse_digits(cell(row, price_col))),
                stock: parse_digits(cell(row, stock_col)),
                is_active: true,
                attributes,
                updated_at: Utc::now(),
            };
            let key = product.key();

            match self.products.upsert(product).await {
                Ok(()) => {
                    seen.insert(key);
                    report.upserted += 1;
                    if self.write_feedback {
                        if let Some(column) = status_col {
                            // Best-effort; the sync outcome does not depend
                            // on the feedback cell.
                            if let Err(error) = self
                                .sheets
                                .set_cell(
                                    spreadsheet_id,
                                    index + 1,
                                    column,
                                    &Utc::now().to_rfc3339(),
                                )
                                .await
                            {
                                warn!(
                                    event_name = "feedback_write_failed",
                                    error = %error,
                                    row = index + 1,
                                    "feedback cell was not written"
                                );
                            }
                        }
                    }
                }
                Err(error) => {
                    warn!(
                        event_name = "row_sync_failed",
                        error = %error,
                        row = index + 1,
                        "skipping row after a failed upsert"
                    );
                    // The row was observed in the snapshot; a failed update
                    // must not cascade into deactivating the product.
                    seen.insert(key);
                    report.errors += 1;
                }
            }
        }

        for product in self.products.all_for_store(&store.id).await.map_err(persistence)? {
            if product.is_active && !seen.contains(&product.key()) {
                match self.products.deactivate(&product.id).await {
                    Ok(()) => report.deactivated += 1,
                    Err(error) => {
                        warn!(
                            event_name = "deactivation_failed",
                            error = %error,
                            product = %product.name,
                            "product left active"
                        );
                        report.errors += 1;
                    }
                }
            }
        }

        info!(
            event_name = "catalog_synced",
            store_id = %store.id.0,
            upserted = report.upserted,
            deactivated = report.deactivated,
            errors = report.errors,
            "catalog reconciled"
        );
        Ok(report)
    }
}

fn external(error: SheetsError) -> ApplicationError {
    ApplicationError::ExternalService(error.to_string())
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn column_index(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|header| header == name)
}

fn cell(row: &[String], index: Option<usize>) -> &str {
    index.and_then(|index| row.get(index)).map(String::as_str).unwrap_or("")
}

/// Tolerant numeric parsing: strips everything that is not an ASCII digit and
/// falls back to 0, so "45,000₮" parses and "үнэгүй" does not abort the row.
fn parse_digits(raw: &str) -> i64 {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}
