//! HTTP and WebSocket surface for the Resona job pipeline.
//!
//! Hosts the job producer (submit → persist → enqueue), the realtime
//! broadcaster (owner-keyed WebSocket registry), and the REST endpoints
//! for job submission and status polling.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod producer;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
