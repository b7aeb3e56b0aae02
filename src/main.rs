use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use phrasebook::config::{Config, StorageBackend};
use phrasebook::manager::TranslationManager;
use phrasebook::registry::RequestRegistry;
use phrasebook::storage::{MemoryStore, SnapshotStore, SqliteStore, Storage};
use phrasebook::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("phrasebook=info".parse()?),
        )
        .init();

    info!("Starting phrasebook translation service");

    // Load configuration from environment
    let config = Config::from_env()?;

    // Step 1: Open the backing store
    let store = open_store(&config).await?;
    info!("✓ Storage backend ready");

    // Step 2: Bring the manager up to date with the store
    let manager = TranslationManager::new(vec![store]);
    match manager.sync().await {
        Ok(()) => info!(
            "✓ Initial sync complete, {} translations cached",
            manager.translation_count()
        ),
        Err(err) => warn!("Initial translation sync failed: {}", err),
    }
    manager.set_refresh_interval(config.sync_interval()).await;

    // Step 3: Serve
    let registry = Arc::new(RequestRegistry::new());
    let state = AppState::new(manager.clone(), registry, config.admin_api_key.clone());
    let app = web::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("✓ Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the periodic refresh before exiting so no sync is left mid-flight
    manager.set_refresh_interval(None).await;
    info!("Shut down cleanly");
    Ok(())
}

/// Build the storage backend selected by the configuration, seeding the
/// locale bookkeeping where the backend supports writes.
async fn open_store(config: &Config) -> Result<Arc<dyn Storage>> {
    match config.storage_backend {
        StorageBackend::Memory => {
            info!("Using the in-memory storage backend");
            Ok(Arc::new(MemoryStore::seeded(
                config.default_locale.clone(),
                config.supported_locales.clone(),
            )))
        }
        StorageBackend::Sqlite => {
            info!("Using the SQLite backend at {}", config.database_path);
            let store = SqliteStore::new(&config.database_path)?;
            // Seed only a fresh database; locales changed through the admin
            // API survive restarts.
            if store.supported_locales().await?.is_empty() {
                info!("Seeding locale bookkeeping into the fresh database");
                for locale in &config.supported_locales {
                    store.add_supported_locale(locale).await?;
                }
                store.set_default_locale(&config.default_locale).await?;
            }
            Ok(Arc::new(store))
        }
        StorageBackend::Snapshot => {
            let url = config
                .snapshot_url
                .clone()
                .context("SNAPSHOT_URL not set")?;
            info!("Using the snapshot backend at {}", url);
            Ok(Arc::new(SnapshotStore::new(url)))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", err);
    }
}
