//! Event synchronization for the Resona job pipeline.
//!
//! This crate consumes lifecycle events published by workers, reconciles
//! the persisted job row, and hands the canonical snapshot to a
//! [`JobUpdateSink`] for real-time fan-out:
//!
//! - [`update_for`] — pure mapping from an event payload to the partial
//!   row update it implies.
//! - [`JobUpdateSink`] — injectable broadcast seam implemented by the
//!   API's connection registry.
//! - [`EventSynchronizer`] — the long-running consume loop.

pub mod sink;
pub mod sync;
pub mod update;

pub use sink::JobUpdateSink;
pub use sync::EventSynchronizer;
pub use update::update_for;
