use std::process::ExitCode;
use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use eventdesk_server::auth::TokenIssuer;
use eventdesk_server::config::{Config, StorageBackend};
use eventdesk_server::routes::create_routes;
use eventdesk_server::seed::seed_admin;
use eventdesk_server::state::AppState;
use eventdesk_server::store::{MemoryStore, PgStore, Store};

const DEFAULT_LOG_FILTER: &str = "info,eventdesk_server=debug,tower_http=info";

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match config.storage {
        StorageBackend::Postgres => {
            let store = PgStore::connect(&config.database_url, config.database_max_connections).await?;
            tracing::info!("Successfully connected to database");
            store.migrate().await?;
            tracing::info!("Migrations run successfully");
            Arc::new(store)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store, data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    if let Some(seed) = &config.admin_seed {
        seed_admin(store.as_ref(), seed).await?;
    }

    let state = AppState::new(store, TokenIssuer::new(config.tokens.clone()));
    let app = create_routes(state, &config.http);

    let listener = TcpListener::bind(config.server_addr).await?;
    tracing::info!("🚀 Server running at http://{}", config.server_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
