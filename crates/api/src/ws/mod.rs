//! Realtime job updates over WebSocket.

pub mod handler;
pub mod registry;

pub use registry::{ConnectionRegistry, WsSender};
