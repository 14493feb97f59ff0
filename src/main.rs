use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lab_datasheet_api::config::{self, StorageBackend};
use lab_datasheet_api::database::{DatabaseManager, PgStore};
use lab_datasheet_api::datasheet::{DatasheetStore, MemoryStore};
use lab_datasheet_api::router::app;
use lab_datasheet_api::services::DatasheetService;

#[derive(Debug, Parser)]
#[command(name = "lab-datasheet-api", version, about = "Lab datasheet API server")]
struct Cli {
    /// Port to listen on (overrides API_PORT / PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Storage backend: memory or postgres (overrides STORAGE_BACKEND)
    #[arg(long)]
    storage: Option<StorageBackend>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")))
        .init();

    let cli = Cli::parse();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    if lab_datasheet_api::is_development!() {
        tracing::info!("Starting Lab Datasheet API in development mode: {:?}", config.query);
    } else {
        tracing::info!("Starting Lab Datasheet API in {:?} mode", config.environment);
    }

    let storage = cli.storage.unwrap_or(config.storage);
    let store: Arc<dyn DatasheetStore> = match storage {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Postgres => {
            let pool = DatabaseManager::connect(&config.database)
                .await
                .context("failed to connect to Postgres")?;
            Arc::new(PgStore::new(pool))
        }
    };
    tracing::info!("Using {} storage", store.backend());

    let app = app(DatasheetService::new(store));

    let port = cli.port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Lab Datasheet API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
