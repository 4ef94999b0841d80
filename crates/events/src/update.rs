//! Mapping from lifecycle events to partial job-row updates.

use resona_broker::JobEventKind;
use resona_core::jobs::truncate_error;
use resona_db::models::{JobStatus, JobUpdate};

/// Compute the partial update implied by an event payload.
///
/// - `processing` touches status only;
/// - `done` sets status plus both output keys;
/// - `failed` sets status plus the truncated error text.
///
/// The mapping is pure and deterministic, so applying the identical event
/// twice produces the identical row state.
pub fn update_for(kind: &JobEventKind) -> JobUpdate {
    match kind {
        JobEventKind::Processing {} => JobUpdate {
            status: JobStatus::Processing,
            result_object_key: None,
            preview_object_key: None,
            last_error: None,
        },
        JobEventKind::Done {
            result_object_key,
            preview_object_key,
        } => JobUpdate {
            status: JobStatus::Done,
            result_object_key: Some(result_object_key.clone()),
            preview_object_key: Some(preview_object_key.clone()),
            last_error: None,
        },
        JobEventKind::Failed { error } => JobUpdate {
            status: JobStatus::Failed,
            result_object_key: None,
            preview_object_key: None,
            last_error: Some(truncate_error(error)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resona_core::jobs::MAX_ERROR_LEN;

    #[test]
    fn processing_touches_status_only() {
        let update = update_for(&JobEventKind::Processing {});
        assert_eq!(update.status, JobStatus::Processing);
        assert!(update.result_object_key.is_none());
        assert!(update.preview_object_key.is_none());
        assert!(update.last_error.is_none());
    }

    #[test]
    fn done_sets_both_output_keys() {
        let update = update_for(&JobEventKind::Done {
            result_object_key: "jobs/x/master.wav".into(),
            preview_object_key: "jobs/x/preview.mp3".into(),
        });
        assert_eq!(update.status, JobStatus::Done);
        assert_eq!(update.result_object_key.as_deref(), Some("jobs/x/master.wav"));
        assert_eq!(update.preview_object_key.as_deref(), Some("jobs/x/preview.mp3"));
        assert!(update.last_error.is_none());
    }

    #[test]
    fn failed_truncates_error_text() {
        let update = update_for(&JobEventKind::Failed {
            error: "e".repeat(3 * MAX_ERROR_LEN),
        });
        assert_eq!(update.status, JobStatus::Failed);
        assert_eq!(update.last_error.as_ref().map(String::len), Some(MAX_ERROR_LEN));
    }

    #[test]
    fn identical_done_events_compute_identical_updates() {
        let kind = JobEventKind::Done {
            result_object_key: "jobs/x/master.wav".into(),
            preview_object_key: "jobs/x/preview.mp3".into(),
        };
        assert_eq!(update_for(&kind), update_for(&kind));
    }

    // A stale `processing` event computes a backward status update; the
    // repository applies it last-write-wins. This pins the current
    // behavior rather than endorsing it.
    #[test]
    fn stale_processing_update_still_moves_status_backward() {
        let update = update_for(&JobEventKind::Processing {});
        assert_eq!(update.status, JobStatus::Processing);
        assert!(
            update.result_object_key.is_none(),
            "processing never clears output keys; only status regresses"
        );
    }
}
