//! AMQP topology and wire messages for the Resona job pipeline.
//!
//! Two logical channels ride on one connection:
//!
//! - **Work channel**: a durable direct exchange routing `job.start`
//!   messages to one durable queue consumed by competing workers.
//! - **Event channel**: a durable topic exchange; each synchronizer
//!   instance binds its own exclusive auto-delete queue with `job.*` so
//!   every running instance sees every lifecycle event.
//!
//! The [`Broker`] handle is constructed once during process startup and
//! injected into the producer, worker, and synchronizer. There is no lazy
//! global topology state.

pub mod config;
pub mod error;
pub mod messages;
pub mod topology;

pub use config::BrokerConfig;
pub use error::BrokerError;
pub use messages::{JobEvent, JobEventKind, WorkMessage, EVENT_SCHEMA_VERSION};
pub use topology::Broker;
