//! Start-message consumer and per-job state machine.
//!
//! For each delivery: deserialize (malformed → drop without requeue), emit
//! `job.processing`, run the pipeline, emit `job.done` or `job.failed`,
//! then acknowledge. Acknowledgment comes only after a terminal event has
//! been published, so a crash mid-pipeline causes redelivery and the
//! pipeline re-executes from the start — there is no terminal-status check
//! on redelivered messages.
//!
//! Each delivery is handled on its own task, so pipelines for separate
//! jobs run in parallel. The channel prefetch bounds that parallelism:
//! once the window of unacknowledged deliveries is full, the broker stops
//! sending until one is acked.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::BasicAckOptions;
use tokio_util::sync::CancellationToken;

use resona_broker::{Broker, BrokerError, JobEvent, WorkMessage};
use resona_core::jobs::truncate_error;
use resona_core::types::DbId;
use resona_storage::ObjectStorage;

use crate::pipeline::{self, JobOutputs, PipelineError};

/// Executes one job's pipeline.
///
/// Seam between the consume loop and the ffmpeg/storage pipeline, so the
/// loop's dispatch and acknowledgment behavior can be exercised without
/// either.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run_job(&self, job_id: DbId, object_key: &str)
        -> Result<JobOutputs, PipelineError>;
}

/// Production runner: the full download → master → preview → upload chain.
pub struct PipelineRunner {
    storage: ObjectStorage,
}

impl PipelineRunner {
    pub fn new(storage: ObjectStorage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl JobRunner for PipelineRunner {
    async fn run_job(
        &self,
        job_id: DbId,
        object_key: &str,
    ) -> Result<JobOutputs, PipelineError> {
        pipeline::run_job(&self.storage, job_id, object_key).await
    }
}

/// Consumes the work queue and executes mastering jobs.
pub struct WorkerEngine {
    broker: Arc<Broker>,
    runner: Arc<dyn JobRunner>,
    prefetch: u16,
}

impl WorkerEngine {
    pub fn new(broker: Arc<Broker>, storage: ObjectStorage, prefetch: u16) -> Self {
        Self::with_runner(broker, Arc::new(PipelineRunner::new(storage)), prefetch)
    }

    pub fn with_runner(broker: Arc<Broker>, runner: Arc<dyn JobRunner>, prefetch: u16) -> Self {
        Self {
            broker,
            runner,
            prefetch,
        }
    }

    /// Consume start messages until cancelled.
    ///
    /// Each delivery is dispatched to its own task immediately, keeping the
    /// consume loop free to accept the next delivery up to the prefetch
    /// bound. Cancellation stops taking new deliveries; pipelines already
    /// running hold their deliveries unacked, and the broker requeues them
    /// if the connection closes before they finish.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), BrokerError> {
        let consumer_tag = format!("resona-worker-{}", uuid::Uuid::new_v4());
        let mut consumer = self.broker.consume_work(&consumer_tag, self.prefetch).await?;

        tracing::info!(
            consumer_tag = %consumer_tag,
            prefetch = self.prefetch,
            "Worker engine started"
        );

        let engine = Arc::new(self);

        loop {
            let delivery = tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Worker engine cancelled");
                    break;
                }
                next = consumer.next() => next,
            };

            match delivery {
                Some(Ok(delivery)) => {
                    let engine = Arc::clone(&engine);
                    tokio::spawn(async move { engine.handle_delivery(delivery).await });
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Work delivery error");
                }
                None => {
                    tracing::warn!("Work stream closed, engine exiting");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Process one delivery through the state machine.
    async fn handle_delivery(&self, delivery: Delivery) {
        // Received: a payload that does not parse (missing jobId, missing
        // object key, unknown type) is malformed, not retryable — ack and
        // drop.
        let message = match serde_json::from_slice::<WorkMessage>(&delivery.data) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed start message");
                ack(&delivery).await;
                return;
            }
        };

        let WorkMessage::JobStart {
            job_id, object_key, ..
        } = message;

        tracing::info!(job_id = %job_id, object_key = %object_key, "Job started");

        // Processing: announce before the blocking pipeline begins.
        self.publish(&JobEvent::processing(job_id)).await;

        // Terminal: any step failure becomes a job.failed event rather
        // than an error propagated out of the loop.
        match self.runner.run_job(job_id, &object_key).await {
            Ok(outputs) => {
                self.publish(&JobEvent::done(
                    job_id,
                    outputs.result_object_key,
                    outputs.preview_object_key,
                ))
                .await;
                tracing::info!(job_id = %job_id, "Job done");
            }
            Err(e) => {
                self.publish(&JobEvent::failed(job_id, truncate_error(&e.to_string())))
                    .await;
                tracing::warn!(job_id = %job_id, error = %e, "Job failed");
            }
        }

        // Ack only now, after the terminal event went out. A crash above
        // leaves the delivery unacknowledged and it will be redelivered.
        ack(&delivery).await;
    }

    /// Publish a lifecycle event; a publish failure is logged but does not
    /// abort the delivery (the message will be redelivered unacked only if
    /// the process dies before `ack`).
    async fn publish(&self, event: &JobEvent) {
        if let Err(e) = self.broker.publish_event(event).await {
            tracing::error!(
                job_id = %event.job_id,
                event_type = event.kind.routing_key(),
                error = %e,
                "Failed to publish lifecycle event"
            );
        }
    }
}

async fn ack(delivery: &Delivery) {
    if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
        tracing::error!(error = %e, "Failed to ack work delivery");
    }
}
