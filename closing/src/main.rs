//! Closebook server binary.
//!
//! Serves the period closing and ledger API over HTTP.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use closebook_closing::http::{build_app, AppState};
use closebook_closing::{ClosingConfig, Metrics, PeriodClosingService, ServiceState, StoreBackend};
use closebook_ledger::{LedgerStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClosingConfig::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Closebook server");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    match config.store {
        StoreBackend::Postgres => {
            let store = PgStore::connect(&config.database_url, config.max_connections).await?;
            if config.run_migrations {
                store.migrate().await?;
                info!("Migrations applied");
            }
            serve(Arc::new(store), &config).await
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; data is discarded on exit");
            serve(Arc::new(MemoryStore::new()), &config).await
        }
    }
}

async fn serve<S: LedgerStore>(store: Arc<S>, config: &ClosingConfig) -> anyhow::Result<()> {
    let metrics = Arc::new(Metrics::new());
    let service = PeriodClosingService::new(store, config, metrics);

    if config.seed_chart || config.store == StoreBackend::Memory {
        let inserted = service.ledger().seed_default_chart().await?;
        info!(inserted, "Chart of accounts ready");
    }

    let state = Arc::new(AppState::new(service));
    let app = build_app(state.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    state.set_state(ServiceState::Running);
    info!(
        listen_addr = %config.listen_addr,
        listen_port = %config.listen_port,
        retained_earnings = %config.retained_earnings_code,
        "Server running"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await?;

    state.set_state(ServiceState::Stopped);
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal<S: LedgerStore>(state: Arc<AppState<S>>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
    state.set_state(ServiceState::ShuttingDown);
}
