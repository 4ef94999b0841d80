//! Mastering job entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use resona_core::types::{DbId, Timestamp};

/// Lifecycle status of a mastering job.
///
/// Intended to move monotonically along `queued → processing → {done|failed}`.
/// Note that the event synchronizer applies updates last-write-wins, so a
/// late-delivered `processing` event can still move a terminal row backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    /// The stored column value for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// True for `done` and `failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl TryFrom<String> for JobStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A row from the `jobs` table. Serialized camelCase — this is the canonical
/// job snapshot pushed to clients and returned from the API.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: DbId,
    pub owner_id: DbId,
    pub input_object_key: String,
    pub reference_object_key: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    pub result_object_key: Option<String>,
    pub preview_object_key: Option<String>,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for submitting a new job via `POST /api/v1/jobs`.
///
/// The input object is expected to be fully uploaded already; that
/// precondition is enforced by the upload flow, not here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJob {
    pub input_object_key: String,
    pub reference_object_key: Option<String>,
}

/// Partial update applied to a job row by the event synchronizer.
///
/// `None` fields are left untouched (`COALESCE` in SQL). There is no status
/// guard or version token: the synchronizer is the sole writer after
/// creation and updates are last-write-wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub result_object_key: Option<String>,
    pub preview_object_key: Option<String>,
    pub last_error: Option<String>,
}
