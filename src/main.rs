mod admin;
mod auth;
mod db;
mod error;
mod middleware;
mod notification;
mod routes;
mod state;

use db::{create_pool, run_migrations};
use notification::{
    channels, start_maintenance_service, Dispatcher, NotificationRepository, NotificationService,
    NotificationStore, RetryScheduler,
};
use routes::create_router;
use state::{AppState, Config};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,booking_notifier=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env()?);

    tracing::info!("Connecting to database...");
    let db = create_pool(&config.database_url, config.database_max_connections).await?;

    tracing::info!("Running migrations...");
    run_migrations(&db).await?;

    // Delivery channels
    let http_client =
        channels::http_client(config.channel_timeout, config.channel_connect_timeout)?;
    let channels = channels::from_config(&config, http_client);

    let store: Arc<dyn NotificationStore> = Arc::new(NotificationRepository::new(db.clone()));
    let dispatcher = Dispatcher::new(store.clone(), channels, config.claim_lease);

    let shutdown = CancellationToken::new();
    let retry_scheduler = RetryScheduler::new(
        store.clone(),
        dispatcher.clone(),
        config.retry_interval,
        config.retry_batch_size,
        shutdown.child_token(),
    );

    let notification_service = NotificationService::new(
        store,
        dispatcher,
        retry_scheduler.clone(),
        config.default_max_retries,
        config.purge_after_days,
    );

    // Background work
    let retry_handle = retry_scheduler.spawn();
    let mut maintenance =
        start_maintenance_service(notification_service.clone(), &config.purge_cron).await?;

    let state = AppState {
        config: config.clone(),
        notification_service,
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down background tasks...");
    shutdown.cancel();
    if let Err(e) = retry_handle.await {
        tracing::error!("Retry scheduler task ended abnormally: {:?}", e);
    }
    if let Err(e) = maintenance.shutdown().await {
        tracing::error!("Maintenance scheduler shutdown failed: {:?}", e);
    }

    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
