//! Worker execution engine for mastering jobs.
//!
//! Consumes `job.start` messages from the durable work queue, runs the
//! mastering pipeline, and publishes lifecycle events. Competing consumers
//! on the same queue provide horizontal scale-out; the prefetch bound caps
//! in-flight jobs per instance.

pub mod engine;
pub mod pipeline;
pub mod transform;

pub use engine::{JobRunner, PipelineRunner, WorkerEngine};
