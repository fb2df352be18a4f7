use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use shopbot_agent::{ExtractionOracle, HttpLlmClient, LlmClient, Responder};
use shopbot_core::config::{AppConfig, ConfigError, LoadOptions};
use shopbot_db::repositories::{
    ProductRepository, SqlConversationRepository, SqlCustomerRepository, SqlOrderRepository,
    SqlProductRepository, SqlStoreRepository, StoreRepository,
};
use shopbot_db::{connect_with_settings, migrations, DbPool};
use shopbot_engine::{Pipeline, SimulatedPaymentClient};
use shopbot_messenger::{HttpMessengerClient, MessengerClient, NoopNotificationEmitter};
use shopbot_sync::{CooldownLock, HttpSpreadsheetClient, Reconciler};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub pipeline: Arc<Pipeline>,
    pub reconciler: Arc<Reconciler>,
    pub stores: Arc<dyn StoreRepository>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("incomplete configuration: {0}")]
    IncompleteConfig(&'static str),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "bootstrap_start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "migrations_applied", "database migrations applied");

    let stores: Arc<dyn StoreRepository> = Arc::new(SqlStoreRepository::new(db_pool.clone()));
    let customers = Arc::new(SqlCustomerRepository::new(db_pool.clone()));
    let conversations = Arc::new(SqlConversationRepository::new(db_pool.clone()));
    let products = Arc::new(SqlProductRepository::new(db_pool.clone()));
    let orders = Arc::new(SqlOrderRepository::new(db_pool.clone()));

    // Config validation already requires the key; this guards direct callers
    // of bootstrap_with_config.
    let llm_api_key = config
        .llm
        .api_key
        .clone()
        .ok_or(BootstrapError::IncompleteConfig("llm.api_key"))?;
    let llm: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::new(
        config.llm.base_url.clone(),
        llm_api_key,
        config.llm.model.clone(),
        config.llm.max_retries,
    ));
    let llm_timeout = Duration::from_secs(config.llm.timeout_secs);
    let oracle = ExtractionOracle::new(Arc::clone(&llm), llm_timeout);
    let responder = Responder::new(llm, llm_timeout);

    let messenger: Arc<dyn MessengerClient> = Arc::new(HttpMessengerClient::with_timeout(
        config.messenger.api_base_url.clone(),
        config.messenger.page_access_token.clone(),
        Duration::from_secs(config.messenger.send_timeout_secs),
    ));

    let pipeline = Arc::new(Pipeline::new(
        Arc::clone(&stores),
        customers,
        conversations,
        Arc::clone(&products) as Arc<dyn ProductRepository>,
        orders,
        oracle,
        responder,
        messenger,
        Arc::new(NoopNotificationEmitter),
        Arc::new(SimulatedPaymentClient),
        config.payment.enabled,
    ));

    let reconciler = Arc::new(Reconciler::new(
        products,
        Arc::new(HttpSpreadsheetClient::new(
            config.sheets.api_base_url.clone(),
            config.sheets.api_key.clone(),
        )),
        Arc::new(CooldownLock::new(Duration::from_secs(config.sheets.sync_cooldown_secs))),
        config.sheets.write_feedback,
    ));

    info!(event_name = "bootstrap_complete", "application wired");
    Ok(Application { config, db_pool, pipeline, reconciler, stores })
}
