mod app;
mod auth;
mod config;
mod database;
mod error;
mod models;
mod pipeline;
mod properties;
mod routes;
mod storage;
mod templates;
mod visualization;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app::AppState;
use config::{Settings, load_settings_from_path};
use database::Database;
use database::memory::MemoryDatabase;
use database::postgres::PostgresDatabase;
use pipeline::broadcast::BroadcastDispatcher;
use pipeline::{DisabledDispatcher, Dispatcher};
use properties::PropertyStore;
use properties::memory::MemoryPropertyStore;
use properties::postgres::PostgresPropertyStore;
use storage::local::LocalStorage;

async fn init_database(settings: &Settings) -> anyhow::Result<Arc<dyn Database>> {
    let database: Arc<dyn Database> = match settings.database_provider.as_str() {
        "postgres" => {
            let uri = settings
                .postgres_uri
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("POSTGRES_URI required for postgres database"))?;
            Arc::new(PostgresDatabase::new(uri, settings.db_pool_size).await?)
        }
        "memory" => {
            warn!("Using in-memory database; records are lost on restart");
            Arc::new(MemoryDatabase::new())
        }
        other => anyhow::bail!("Unsupported database provider: {other}"),
    };
    database.initialize().await?;
    Ok(database)
}

async fn init_property_store(settings: &Settings) -> anyhow::Result<Arc<dyn PropertyStore>> {
    let store: Arc<dyn PropertyStore> = match settings.property_store_provider.as_str() {
        "postgres" => Arc::new(PostgresPropertyStore::new(&settings.property_store).await?),
        "memory" => Arc::new(MemoryPropertyStore::new()),
        other => anyhow::bail!("Unsupported property store provider: {other}"),
    };
    store.initialize().await?;
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting plnweb server...");

    // Load configuration.
    let settings = load_settings_from_path("plnweb.toml")?;
    info!(
        "Configuration loaded: environment={}, host={}, port={}",
        settings.environment, settings.host, settings.port
    );
    if settings.bypass_auth_mode {
        warn!("Auth bypass enabled; every request runs as {}", settings.dev_user_id);
    }

    let database = init_database(&settings).await?;
    info!("Database initialized: {}", settings.database_provider);

    let property_store = init_property_store(&settings).await?;
    info!("Property store initialized: {}", property_store.provider_name());

    let storage: Arc<dyn storage::Storage> = match settings.storage_provider.as_str() {
        "local" => Arc::new(LocalStorage::new(&settings.storage_path)),
        other => anyhow::bail!("Unsupported storage provider: {other}"),
    };
    info!(
        "Storage initialized: {} ({})",
        storage.provider_name(),
        settings.storage_path
    );

    let dispatcher: Arc<dyn Dispatcher> = if settings.pipeline_enabled {
        info!("Pipeline dispatch to {}", settings.pipeline_broadcast_url);
        Arc::new(BroadcastDispatcher::new(
            &settings.pipeline_broadcast_url,
            settings.pipeline_timeout,
        ))
    } else {
        info!("Pipeline dispatch disabled");
        Arc::new(DisabledDispatcher)
    };

    // Build application state.
    let state = Arc::new(AppState {
        settings: settings.clone(),
        database,
        property_store,
        storage,
        dispatcher,
    });

    // Build router.
    let app = routes::build_router(state).layer(TraceLayer::new_for_http());

    // Start server.
    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
