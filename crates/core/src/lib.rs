//! Shared types and helpers used across the Resona workspace.

pub mod error;
pub mod jobs;
pub mod types;
