//! Allince API Server
//!
//! REST API server for account, session and token management.

use allince_api::{create_router, state::AppState};
use allince_core::config::{AppConfig, LoggingConfig, StorageBackend};
use allince_core::store::{self, MemorySessionStore, MemoryUserStore, PgSessionStore, PgUserStore};
use allince_core::{SessionStore, UserStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.level;
        format!("allince_api={level},allince_core={level},audit=info,tower_http=info").into()
    });

    if config.json_format {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging);

    let (users, sessions): (Arc<dyn UserStore>, Arc<dyn SessionStore>) =
        match config.storage.backend {
            StorageBackend::Postgres => {
                let pool = store::connect(&config.database).await?;
                if config.database.run_migrations {
                    store::run_migrations(&pool).await?;
                    tracing::info!("Database migrations applied");
                }
                (
                    Arc::new(PgUserStore::new(pool.clone(), &config.database)),
                    Arc::new(PgSessionStore::new(pool, &config.database)),
                )
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory stores; accounts and sessions are not persisted");
                (
                    Arc::new(MemoryUserStore::new()),
                    Arc::new(MemorySessionStore::new()),
                )
            }
        };

    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = Arc::new(AppState::new(config, users, sessions));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Allince API Server starting on http://{}", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
