use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shopbot_core::domain::store::StoreId;
use shopbot_core::errors::{ApplicationError, InterfaceError};
use shopbot_db::repositories::StoreRepository;
use shopbot_sync::Reconciler;

#[derive(Clone)]
pub struct AdminState {
    pub stores: Arc<dyn StoreRepository>,
    pub reconciler: Arc<Reconciler>,
}

pub fn router(state: AdminState) -> Router {
    Router::new().route("/api/v1/stores/{store_id}/sync", post(sync_store)).with_state(state)
}

/// Manual catalog sync trigger. Rejections inside the cooldown window come
/// back as 429 rather than queueing a second run.
async fn sync_store(
    State(state): State<AdminState>,
    Path(store_id): Path<Uuid>,
) -> (StatusCode, Json<Value>) {
    let correlation_id = Uuid::new_v4().to_string();

    let store = match state.stores.find_by_id(&StoreId(store_id)).await {
        Ok(Some(store)) => store,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "store not found", "correlation_id": correlation_id })),
            );
        }
        Err(error) => {
            return error_response(
                ApplicationError::Persistence(error.to_string()),
                correlation_id,
            );
        }
    };

    match state.reconciler.reconcile_store(&store).await {
        Ok(report) => {
            info!(
                event_name = "manual_sync_completed",
                store_id = %store.id.0,
                upserted = report.upserted,
                "manual catalog sync finished"
            );
            (
                StatusCode::OK,
                Json(json!({
                    "upserted": report.upserted,
                    "deactivated": report.deactivated,
                    "errors": report.errors,
                })),
            )
        }
        Err(error) => error_response(error, correlation_id),
    }
}

fn error_response(error: ApplicationError, correlation_id: String) -> (StatusCode, Json<Value>) {
    let interface = error.into_interface(correlation_id.clone());
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({ "error": interface.user_message(), "correlation_id": correlation_id })),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::{Path, State};
    use axum::http::StatusCode;

    use shopbot_core::domain::store::{ColumnMapping, Store, StoreId};
    use shopbot_db::repositories::{InMemoryProductRepository, InMemoryStoreRepository};
    use shopbot_db::repositories::{ProductRepository, StoreRepository};
    use shopbot_sync::{CooldownLock, Reconciler, StaticSheet};

    use super::{sync_store, AdminState};

    async fn state_with_store(cooldown_secs: u64) -> (AdminState, Store) {
        let stores = Arc::new(InMemoryStoreRepository::default());
        let products = Arc::new(InMemoryProductRepository::default());
        let sheet = Arc::new(StaticSheet::new(
            ["Нэр", "Үнэ", "Үлдэгдэл"],
            vec![vec!["хар цамц", "45000", "10"]],
        ));

        let store = Store {
            id: StoreId::new(),
            name: "Shop".to_string(),
            channel_ids: vec!["page-1".to_string()],
            spreadsheet_id: Some("sheet-1".to_string()),
            has_delivery: true,
            pickup_address: None,
            accepts_invoicing: false,
            persona: String::new(),
            column_mapping: ColumnMapping::default(),
            currency: "MNT".to_string(),
            is_active: true,
        };
        stores.save(store.clone()).await.expect("seed store");

        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&products) as Arc<dyn ProductRepository>,
            sheet,
            Arc::new(CooldownLock::new(Duration::from_secs(cooldown_secs))),
            false,
        ));

        (AdminState { stores, reconciler }, store)
    }

    #[tokio::test]
    async fn manual_sync_reports_the_reconciliation_outcome() {
        let (state, store) = state_with_store(0).await;

        let (status, body) = sync_store(State(state), Path(store.id.0)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.0.get("upserted").and_then(|v| v.as_u64()), Some(1));
    }

    #[tokio::test]
    async fn sync_inside_the_cooldown_window_returns_429() {
        let (state, store) = state_with_store(30).await;

        let (first, _) = sync_store(State(state.clone()), Path(store.id.0)).await;
        assert_eq!(first, StatusCode::OK);

        let (second, _) = sync_store(State(state), Path(store.id.0)).await;
        assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn unknown_stores_return_404() {
        let (state, _) = state_with_store(0).await;

        let (status, _) = sync_store(State(state), Path(uuid::Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
