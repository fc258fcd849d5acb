//! Server setup and initialization
//!
//! Provides the main application builder and server runner.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use modmail_common::{AppConfig, AppError};
use modmail_core::{AuditSink, SnowflakeGenerator, ThreadRepository};
use modmail_db::{create_pool, run_migrations, MemoryThreadRepository, PgThreadRepository};
use modmail_discord::DiscordTransport;
use modmail_service::{
    FanoutAuditSink, LogChannelAuditSink, RegistrySettings, ServiceContextBuilder,
    TracingAuditSink,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::middleware::apply_middleware;
use crate::routes::{create_router, health_routes};
use crate::state::AppState;

/// Build the complete Axum application with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let router = create_router().merge(health_routes());
    let router = apply_middleware(router);
    router.with_state(state)
}

/// Open the thread store named by the configuration
async fn create_repository(config: &AppConfig) -> Result<Arc<dyn ThreadRepository>, AppError> {
    let Some(database) = &config.database else {
        warn!("DATABASE_URL is not set; threads will not survive a restart");
        return Ok(Arc::new(MemoryThreadRepository::new()));
    };

    info!("Connecting to PostgreSQL...");
    let db_config = modmail_db::DatabaseConfig::new(database.url.clone())
        .with_connections(database.min_connections, database.max_connections);
    let pool = create_pool(&db_config)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    run_migrations(&pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    info!("PostgreSQL connection established");

    Ok(Arc::new(PgThreadRepository::new(pool)))
}

/// Initialize all dependencies and create AppState
pub async fn create_app_state(config: AppConfig) -> Result<AppState, AppError> {
    let repo = create_repository(&config).await?;

    let transport = Arc::new(
        DiscordTransport::new(config.discord.token.clone(), config.discord.transport_timeout)
            .map_err(|e| AppError::ExternalService(e.to_string()))?,
    );

    let audit: Arc<dyn AuditSink> = Arc::new(
        FanoutAuditSink::default()
            .with(Arc::new(TracingAuditSink))
            .with(Arc::new(LogChannelAuditSink::new(
                transport.clone(),
                config.discord.log_channel_id,
                config.discord.transport_timeout,
            ))),
    );

    let snowflake_generator = Arc::new(SnowflakeGenerator::new(config.app.worker_id));

    let service_context = ServiceContextBuilder::new()
        .settings(RegistrySettings::from_config(&config))
        .repository(repo)
        .transport(transport)
        .audit(audit)
        .snowflake_generator(snowflake_generator)
        .prefix(config.modmail.prefix.clone())
        .build()
        .map_err(AppError::from)?;

    Ok(AppState::new(service_context, config))
}

/// Run the HTTP server until ctrl-c
pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), AppError> {
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::internal(anyhow::anyhow!("Failed to bind to {addr}: {e}")))?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(anyhow::anyhow!("Server error: {e}")))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Run the complete server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr: SocketAddr = config.api.address().parse().map_err(|_| {
        AppError::validation(format!("Invalid API address: {}", config.api.address()))
    })?;

    let state = create_app_state(config).await?;

    // Threads that existed before the restart must route again before the
    // first event is accepted
    match state.service_context().registry().reconcile().await {
        Ok(report) => info!(?report, "Registry restored"),
        Err(e) => error!(
            error = %e,
            "Reconciliation failed; open threads will be loaded from the store on first use"
        ),
    }

    let app = create_app(state);
    run_server(app, addr).await
}
