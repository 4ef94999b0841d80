//! The event synchronizer consume loop.
//!
//! Consumes lifecycle events from this instance's exclusive queue,
//! reconciles the persisted job row, reloads the canonical snapshot, and
//! hands it to the [`JobUpdateSink`]. Every delivery is acknowledged —
//! a message that cannot be handled is logged and dropped, never requeued,
//! and no single message may terminate the loop.

use std::sync::Arc;

use futures::StreamExt;
use lapin::options::BasicAckOptions;
use tokio_util::sync::CancellationToken;

use resona_broker::{Broker, JobEvent};
use resona_core::types::DbId;
use resona_db::repositories::JobRepo;
use resona_db::DbPool;

use crate::sink::JobUpdateSink;
use crate::update::update_for;

/// Per-message failure classification. Protocol errors are dropped,
/// infrastructure errors are logged and the message dropped; the loop
/// always continues.
#[derive(Debug, thiserror::Error)]
enum EventError {
    #[error("malformed event payload: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("job update failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("event references unknown job {0}")]
    UnknownJob(DbId),
}

/// Long-running consumer that reconciles job state from lifecycle events.
pub struct EventSynchronizer {
    pool: DbPool,
    broker: Arc<Broker>,
    sink: Arc<dyn JobUpdateSink>,
    prefetch: u16,
}

impl EventSynchronizer {
    pub fn new(
        pool: DbPool,
        broker: Arc<Broker>,
        sink: Arc<dyn JobUpdateSink>,
        prefetch: u16,
    ) -> Self {
        Self {
            pool,
            broker,
            sink,
            prefetch,
        }
    }

    /// Bind this instance's event queue and consume until cancelled or the
    /// broker connection goes away.
    pub async fn run(self, cancel: CancellationToken) {
        let consumer_tag = format!("resona-sync-{}", uuid::Uuid::new_v4());
        let mut consumer = match self
            .broker
            .consume_events(&consumer_tag, self.prefetch)
            .await
        {
            Ok(consumer) => consumer,
            Err(e) => {
                tracing::error!(error = %e, "Failed to start event consumer");
                return;
            }
        };

        tracing::info!(consumer_tag = %consumer_tag, "Event synchronizer started");

        loop {
            let delivery = tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Event synchronizer cancelled");
                    break;
                }
                next = consumer.next() => next,
            };

            let delivery = match delivery {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => {
                    // Transient consumer error; the connection layer
                    // reconnects, so keep the loop alive.
                    tracing::error!(error = %e, "Event delivery error");
                    continue;
                }
                None => {
                    tracing::warn!("Event stream closed, synchronizer exiting");
                    break;
                }
            };

            if let Err(e) = self.handle(&delivery.data).await {
                match &e {
                    EventError::Protocol(_) => {
                        tracing::warn!(error = %e, "Dropping malformed event")
                    }
                    EventError::Database(_) => {
                        tracing::error!(error = %e, "Dropping event after update failure")
                    }
                    EventError::UnknownJob(job_id) => {
                        tracing::warn!(job_id = %job_id, "Dropping event for unknown job")
                    }
                }
            }

            // Acknowledge unconditionally: handled or dropped, the message
            // is never requeued.
            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                tracing::error!(error = %e, "Failed to ack event delivery");
            }
        }
    }

    /// Reconcile one event: compute the partial update, apply it, reload
    /// the canonical row, and hand it to the sink.
    async fn handle(&self, data: &[u8]) -> Result<(), EventError> {
        let event: JobEvent = serde_json::from_slice(data)?;

        tracing::debug!(
            job_id = %event.job_id,
            event_type = event.kind.routing_key(),
            version = event.version,
            "Consuming lifecycle event"
        );

        let update = update_for(&event.kind);
        let affected = JobRepo::apply_update(&self.pool, event.job_id, &update).await?;
        if affected == 0 {
            return Err(EventError::UnknownJob(event.job_id));
        }

        let job = JobRepo::find_by_id(&self.pool, event.job_id)
            .await?
            .ok_or(EventError::UnknownJob(event.job_id))?;

        self.sink.deliver(job.owner_id, &job).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_payload_classifies_as_protocol_error() {
        let err = serde_json::from_slice::<JobEvent>(b"not json").unwrap_err();
        let classified = EventError::from(err);
        assert!(matches!(classified, EventError::Protocol(_)));
    }

    #[test]
    fn event_without_job_id_classifies_as_protocol_error() {
        let raw = br#"{"type":"job.processing","occurredAt":"2026-01-01T00:00:00Z","version":1,"data":{}}"#;
        let err = serde_json::from_slice::<JobEvent>(raw).unwrap_err();
        assert!(matches!(EventError::from(err), EventError::Protocol(_)));
    }
}
