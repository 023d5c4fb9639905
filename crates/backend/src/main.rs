use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use record_backend::cache::UserCache;
use record_backend::config::{AppConfig, StorageBackend};
use record_backend::repository::{MemoryUserRepository, PgUserRepository, UserRepository};
use record_backend::store::UserStore;
use record_backend::{db, routes, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "record_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!("Starting record services backend");

    let repository: Arc<dyn UserRepository> = match config.database.backend {
        StorageBackend::Postgres => {
            db::run_migrations(&config.database)
                .await
                .context("failed to apply database migrations")?;
            let pool = db::establish_connection_pool(&config.database)?;
            Arc::new(PgUserRepository::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory user storage; data is lost on restart");
            Arc::new(MemoryUserRepository::new())
        }
    };

    let cache = Arc::new(UserCache::new(config.cache.ttl));
    let sweeper = cache.spawn_sweeper(config.cache.sweep_interval);

    let state = AppState::new(UserStore::new(repository, cache), &config.auth)?;
    let app = routes::build_router(state, config.server.cors_allowed_origins.as_deref());

    let listener = tokio::net::TcpListener::bind(config.server.listen_addr).await?;
    tracing::info!("Server listening on {}", config.server.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
