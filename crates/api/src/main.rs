use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resona_api::config::ServerConfig;
use resona_api::producer::JobProducer;
use resona_api::router::build_app_router;
use resona_api::state::AppState;
use resona_api::ws::ConnectionRegistry;
use resona_broker::{Broker, BrokerConfig};
use resona_events::{EventSynchronizer, JobUpdateSink};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resona_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let broker_config = BrokerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = resona_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    resona_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    resona_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Broker topology (declared up front, owned for the process life) ---
    let broker = Arc::new(
        Broker::connect(&broker_config)
            .await
            .expect("Failed to connect to broker"),
    );
    broker
        .declare_work_topology()
        .await
        .expect("Failed to declare work topology");
    broker
        .declare_event_exchange()
        .await
        .expect("Failed to declare event exchange");
    tracing::info!("Broker topology declared");

    // --- WebSocket registry ---
    let registry = Arc::new(ConnectionRegistry::new());

    // --- Job producer ---
    let producer = Arc::new(JobProducer::new(pool.clone(), Arc::clone(&broker)));

    // --- Event synchronizer ---
    // Consumes lifecycle events from this instance's exclusive queue and
    // pushes reconciled snapshots to the registry.
    let sync_cancel = tokio_util::sync::CancellationToken::new();
    let synchronizer = EventSynchronizer::new(
        pool.clone(),
        Arc::clone(&broker),
        Arc::clone(&registry) as Arc<dyn JobUpdateSink>,
        broker_config.events_prefetch,
    );
    let sync_handle = tokio::spawn(synchronizer.run(sync_cancel.clone()));
    tracing::info!("Event synchronizer started");

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        registry: Arc::clone(&registry),
        producer,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Stop the event synchronizer before tearing down the broker channel.
    sync_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sync_handle).await;
    tracing::info!("Event synchronizer stopped");

    let ws_count = registry.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    registry.shutdown_all().await;

    broker.close().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
