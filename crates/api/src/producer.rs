//! Job submission: persist first, then enqueue.

use std::sync::Arc;

use resona_broker::{Broker, WorkMessage};
use resona_core::types::DbId;
use resona_db::models::{Job, SubmitJob};
use resona_db::repositories::JobRepo;
use resona_db::DbPool;

use crate::error::{AppError, AppResult};

/// Persists submitted jobs and publishes their start messages.
pub struct JobProducer {
    pool: DbPool,
    broker: Arc<Broker>,
}

impl JobProducer {
    pub fn new(pool: DbPool, broker: Arc<Broker>) -> Self {
        Self { pool, broker }
    }

    /// Persist a new `queued` job, then publish its `job.start` message.
    ///
    /// The insert commits before the publish. If the publish fails the row
    /// stays `queued` with no start message in flight; it is visible via
    /// polling but never progresses until resubmitted. There is no outbox
    /// or compensation step.
    pub async fn submit(&self, owner_id: DbId, input: &SubmitJob) -> AppResult<Job> {
        let job = JobRepo::create(&self.pool, owner_id, input).await?;

        let message = WorkMessage::start(job.id, job.input_object_key.clone());
        self.broker
            .publish_start(&message)
            .await
            .map_err(AppError::Broker)?;

        tracing::info!(
            job_id = %job.id,
            owner_id = %owner_id,
            input_object_key = %job.input_object_key,
            "Job queued"
        );

        Ok(job)
    }
}
