use std::sync::Arc;

use crate::config::ServerConfig;
use crate::producer::JobProducer;
use crate::ws::ConnectionRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: resona_db::DbPool,
    /// Server configuration (JWT secret, CORS, timeouts).
    pub config: Arc<ServerConfig>,
    /// Owner-keyed WebSocket connection registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Job producer (persist + enqueue).
    pub producer: Arc<JobProducer>,
}
