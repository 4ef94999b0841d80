use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resona_broker::{Broker, BrokerConfig};
use resona_storage::{ObjectStorage, StorageConfig};
use resona_worker::WorkerEngine;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resona_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let broker_config = BrokerConfig::from_env();
    let storage_config = StorageConfig::from_env();

    // --- Broker topology (owned for the life of the process) ---
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

    // --- Object storage ---
    let storage = ObjectStorage::new(&storage_config);

    // --- Engine ---
    let cancel = CancellationToken::new();
    let engine = WorkerEngine::new(
        Arc::clone(&broker),
        storage,
        broker_config.worker_prefetch,
    );
    let engine_handle = tokio::spawn(engine.run(cancel.clone()));

    shutdown_signal().await;

    // Stop taking new deliveries; unacked in-flight work is requeued by
    // the broker once the connection closes.
    cancel.cancel();
    let _ = engine_handle.await;
    broker.close().await;
    tracing::info!("Worker shut down");
}

/// Wait for SIGINT or SIGTERM.
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
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
