use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use booking_server::clients::{NoopEmailSender, NoopPaymentGateway};
use booking_server::config::Config;
use booking_server::routes::create_routes;
use booking_server::services::ChannelTaskQueue;
use booking_server::state::AppState;
use booking_server::utils::clock::SystemClock;
use booking_server::workers::EmailWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("booking_server=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_db_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("failed to run migrations")?;
    info!("Migrations run successfully");

    let clock = Arc::new(SystemClock);
    let (queue, receiver) = ChannelTaskQueue::new(config.notification.queue_capacity);
    let state = AppState::postgres(
        pool.clone(),
        Arc::new(NoopPaymentGateway),
        Arc::new(queue),
        clock.clone(),
        &config,
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let worker = EmailWorker::new(
        receiver,
        Arc::new(NoopEmailSender),
        clock,
        config.notification.email_from.clone(),
    );
    let worker_handle = tokio::spawn(worker.run(async move {
        let _ = shutdown_rx.changed().await;
    }));

    let app = create_routes(state, &config);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    info!("HTTP server stopped, shutting down workers");
    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(config.graceful_shutdown, worker_handle).await {
        Ok(Ok(())) => info!("Email worker stopped gracefully"),
        Ok(Err(e)) => warn!(error = %e, "Email worker task failed"),
        Err(_) => warn!("Email worker shutdown timed out"),
    }

    pool.close().await;
    info!("Graceful shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}
