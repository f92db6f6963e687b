use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use doc_review::{
    config::{AppConfig, StoreBackend},
    db,
    routes::create_router,
    seed::SeedData,
    state::AppState,
    store::{MemoryStore, PgStore},
    ReviewEngine,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        store_backend = ?config.store_backend,
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        seed_file = ?config.seed_file,
        "loaded review configuration"
    );

    let seed = match config.seed_file.as_ref() {
        Some(path) => Some(SeedData::from_path(path)?),
        None => None,
    };

    let engine = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = db::init_pool_with_size(
                config.require_database_url()?,
                config.database_max_pool_size,
            )?;
            let applied = db::run_migrations(&pool)?;
            tracing::info!(applied, "database migrations complete");
            let store = PgStore::new(pool);
            if let Some(seed) = seed.as_ref() {
                seed.apply_to_postgres(&store)?;
                tracing::info!("applied seed data to postgres store");
            }
            ReviewEngine::with_store(Arc::new(store))
        }
        StoreBackend::Memory => {
            let store = MemoryStore::new();
            if let Some(seed) = seed.as_ref() {
                seed.apply_to_memory(&store)?;
                tracing::info!("applied seed data to memory store");
            } else {
                tracing::warn!("memory store started without seed data; no reviewer roles exist");
            }
            ReviewEngine::with_store(Arc::new(store))
        }
    };

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("SERVER_HOST and SERVER_PORT must form a socket address")?;
    let app = create_router(AppState::new(config, engine));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "document review server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("server received shutdown signal");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
