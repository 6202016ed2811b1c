//! audit-relayer server entry point.
//!
//! Starts the Axum HTTP server and the periodic audit loop.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use audit_relayer::api;
use audit_relayer::app_state::AppState;
use audit_relayer::chain::{
    BatchEncoder, ChainClient, Dispatcher, PermitBuilder, RelayerKeystore, RpcChainClient,
};
use audit_relayer::config::RelayerConfig;
use audit_relayer::persistence::memory::InMemoryStore;
use audit_relayer::persistence::postgres::PostgresStore;
use audit_relayer::persistence::RecordStore;
use audit_relayer::service::{AuditService, RelayService, scheduler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = RelayerConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, chain_id = config.chain_id, "starting audit-relayer");

    // Key material and chain access
    let keystore = Arc::new(RelayerKeystore::from_keys(
        &config.relayer_private_key,
        &config.device_private_keys,
    )?);
    tracing::info!(
        relayer = %keystore.relayer_address(),
        devices = keystore.device_addresses().len(),
        "keystore loaded"
    );
    let client: Arc<dyn ChainClient> = Arc::new(RpcChainClient::connect(
        &config.chain_rpc_url,
        keystore.relayer_signer(),
        config.contract_address,
    )?);

    // Storage
    let store: Arc<dyn RecordStore> = if config.persistence_enabled {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        sqlx::migrate!().run(&pool).await?;
        Arc::new(PostgresStore::new(pool))
    } else {
        tracing::warn!("persistence disabled; records are held in memory only");
        Arc::new(InMemoryStore::new())
    };

    // Service layer
    let audit_service = Arc::new(AuditService::new(Arc::clone(&store), Arc::clone(&client)));
    let permit_builder = PermitBuilder::new(
        Arc::clone(&keystore),
        Arc::clone(&client),
        config.contract_address,
        config.chain_id,
    );
    let dispatcher = Dispatcher::new(
        Arc::clone(&client),
        Duration::from_secs(config.receipt_timeout_secs),
    );
    let relay_service = Arc::new(RelayService::new(
        Arc::clone(&store),
        permit_builder,
        BatchEncoder::new(config.contract_address),
        dispatcher,
        config.max_batch_size,
    ));

    // Periodic trigger
    let _audit_loop = scheduler::spawn_audit_loop(relay_service, config.audit_interval_secs);

    // Build application state and router
    let app_state = AppState { audit_service };
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
