pub mod job;

pub use job::{Job, JobStatus, JobUpdate, SubmitJob};
