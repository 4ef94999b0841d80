//! Wire message types for the work and event channels.
//!
//! Both channels carry JSON with camelCase field names. Dispatch on the
//! `type` tag happens only at the serde boundary; everywhere else the
//! messages are closed enums.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use resona_core::types::{DbId, Timestamp};

/// Schema version stamped on every lifecycle event envelope.
pub const EVENT_SCHEMA_VERSION: i32 = 1;

/// Messages routed over the work channel.
///
/// `job.start` is the only work message today; the closed enum keeps the
/// `type` tag a deserialization concern rather than a string to match on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkMessage {
    #[serde(rename = "job.start", rename_all = "camelCase")]
    JobStart {
        job_id: DbId,
        object_key: String,
        #[serde(default)]
        params: serde_json::Value,
    },
}

impl WorkMessage {
    /// Build a start message for a job.
    pub fn start(job_id: DbId, object_key: impl Into<String>) -> Self {
        WorkMessage::JobStart {
            job_id,
            object_key: object_key.into(),
            params: serde_json::Value::Object(Default::default()),
        }
    }

    /// The job this message refers to (used as AMQP correlation id).
    pub fn job_id(&self) -> DbId {
        match self {
            WorkMessage::JobStart { job_id, .. } => *job_id,
        }
    }
}

/// A lifecycle event emitted by a worker.
///
/// Transient, at-least-once delivered, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    #[serde(rename = "jobId")]
    pub job_id: DbId,
    #[serde(rename = "occurredAt")]
    pub occurred_at: Timestamp,
    pub version: i32,
    #[serde(flatten)]
    pub kind: JobEventKind,
}

/// Type-specific payload of a lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum JobEventKind {
    #[serde(rename = "job.processing")]
    Processing {},

    #[serde(rename = "job.done", rename_all = "camelCase")]
    Done {
        result_object_key: String,
        preview_object_key: String,
    },

    #[serde(rename = "job.failed")]
    Failed { error: String },
}

impl JobEventKind {
    /// Topic routing key used when publishing this event.
    pub fn routing_key(&self) -> &'static str {
        match self {
            JobEventKind::Processing {} => "job.processing",
            JobEventKind::Done { .. } => "job.done",
            JobEventKind::Failed { .. } => "job.failed",
        }
    }
}

impl JobEvent {
    fn new(job_id: DbId, kind: JobEventKind) -> Self {
        Self {
            job_id,
            occurred_at: Utc::now(),
            version: EVENT_SCHEMA_VERSION,
            kind,
        }
    }

    /// The worker has started executing the job's pipeline.
    pub fn processing(job_id: DbId) -> Self {
        Self::new(job_id, JobEventKind::Processing {})
    }

    /// The pipeline completed; both outputs are uploaded.
    pub fn done(
        job_id: DbId,
        result_object_key: impl Into<String>,
        preview_object_key: impl Into<String>,
    ) -> Self {
        Self::new(
            job_id,
            JobEventKind::Done {
                result_object_key: result_object_key.into(),
                preview_object_key: preview_object_key.into(),
            },
        )
    }

    /// A pipeline step failed. `error` must already be truncated by the
    /// caller (see `resona_core::jobs::truncate_error`).
    pub fn failed(job_id: DbId, error: impl Into<String>) -> Self {
        Self::new(job_id, JobEventKind::Failed { error: error.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_id() -> DbId {
        "0a70e5de-9f4b-4c58-a3e8-55d2a0c9f3b7".parse().unwrap()
    }

    #[test]
    fn start_message_wire_format() {
        let msg = WorkMessage::start(job_id(), "in/foo.wav");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "job.start");
        assert_eq!(value["jobId"], job_id().to_string());
        assert_eq!(value["objectKey"], "in/foo.wav");
        assert_eq!(value["params"], serde_json::json!({}));
    }

    #[test]
    fn start_message_without_job_id_is_rejected() {
        let raw = r#"{"type":"job.start","objectKey":"in/foo.wav","params":{}}"#;
        assert!(serde_json::from_str::<WorkMessage>(raw).is_err());
    }

    #[test]
    fn unknown_work_message_type_is_rejected() {
        let raw = r#"{"type":"job.cancel","jobId":"0a70e5de-9f4b-4c58-a3e8-55d2a0c9f3b7"}"#;
        assert!(serde_json::from_str::<WorkMessage>(raw).is_err());
    }

    #[test]
    fn processing_event_has_empty_data() {
        let event = JobEvent::processing(job_id());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "job.processing");
        assert_eq!(value["data"], serde_json::json!({}));
        assert_eq!(value["version"], EVENT_SCHEMA_VERSION);
        assert!(value["occurredAt"].is_string());
    }

    #[test]
    fn done_event_carries_output_keys() {
        let event = JobEvent::done(job_id(), "jobs/x/master.wav", "jobs/x/preview.mp3");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "job.done");
        assert_eq!(value["data"]["resultObjectKey"], "jobs/x/master.wav");
        assert_eq!(value["data"]["previewObjectKey"], "jobs/x/preview.mp3");
    }

    #[test]
    fn failed_event_round_trips() {
        let event = JobEvent::failed(job_id(), "ffmpeg loudnorm failed");
        let raw = serde_json::to_string(&event).unwrap();
        let parsed: JobEvent = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.kind.routing_key(), "job.failed");
    }

    #[test]
    fn event_missing_type_is_rejected() {
        let raw = format!(
            r#"{{"jobId":"{}","occurredAt":"2026-01-01T00:00:00Z","version":1,"data":{{}}}}"#,
            job_id()
        );
        assert!(serde_json::from_str::<JobEvent>(&raw).is_err());
    }

    #[test]
    fn routing_keys_match_event_types() {
        assert_eq!(JobEvent::processing(job_id()).kind.routing_key(), "job.processing");
        assert_eq!(
            JobEvent::done(job_id(), "a", "b").kind.routing_key(),
            "job.done"
        );
    }
}
