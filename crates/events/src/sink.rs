use async_trait::async_trait;

use resona_core::types::DbId;
use resona_db::models::Job;

/// Destination for reconciled job snapshots.
///
/// Implemented by the API's WebSocket connection registry. The seam keeps
/// the synchronizer independent of any particular transport and lets tests
/// observe deliveries directly. Delivery is best-effort; implementations
/// must not fail the caller.
#[async_trait]
pub trait JobUpdateSink: Send + Sync {
    /// Push the canonical snapshot of `job` to every live connection owned
    /// by `owner_id`.
    async fn deliver(&self, owner_id: DbId, job: &Job);
}
