//! Job output naming and error-text bounds shared by the worker and the
//! event synchronizer.
//!
//! Output keys are derived deterministically from the job id so a
//! redelivered start message overwrites the same objects instead of
//! leaking orphans.

use crate::types::DbId;

/// Maximum length of the error text stored on a failed job and carried in
/// `job.failed` events.
pub const MAX_ERROR_LEN: usize = 500;

/// Object key for the mastered output of a job.
pub fn master_object_key(job_id: DbId) -> String {
    format!("jobs/{job_id}/master.wav")
}

/// Object key for the preview clip of a job.
pub fn preview_object_key(job_id: DbId) -> String {
    format!("jobs/{job_id}/preview.mp3")
}

/// Truncate error text to [`MAX_ERROR_LEN`], respecting char boundaries.
pub fn truncate_error(error: &str) -> String {
    if error.len() <= MAX_ERROR_LEN {
        return error.to_string();
    }
    let mut end = MAX_ERROR_LEN;
    while !error.is_char_boundary(end) {
        end -= 1;
    }
    error[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_keys_derive_from_job_id() {
        let id: DbId = "7c3f9f1e-9a44-4b7d-8a6d-2f1f0b9c0a11".parse().unwrap();
        assert_eq!(
            master_object_key(id),
            "jobs/7c3f9f1e-9a44-4b7d-8a6d-2f1f0b9c0a11/master.wav"
        );
        assert_eq!(
            preview_object_key(id),
            "jobs/7c3f9f1e-9a44-4b7d-8a6d-2f1f0b9c0a11/preview.mp3"
        );
    }

    #[test]
    fn short_error_is_unchanged() {
        assert_eq!(truncate_error("boom"), "boom");
    }

    #[test]
    fn long_error_is_truncated_to_bound() {
        let long = "x".repeat(2 * MAX_ERROR_LEN);
        let truncated = truncate_error(&long);
        assert_eq!(truncated.len(), MAX_ERROR_LEN);
    }

    #[test]
    fn truncation_does_not_split_multibyte_chars() {
        // 'é' is two bytes; place one straddling the boundary.
        let mut long = "a".repeat(MAX_ERROR_LEN - 1);
        long.push_str("éééé");
        let truncated = truncate_error(&long);
        assert!(truncated.len() <= MAX_ERROR_LEN);
        assert!(truncated.is_char_boundary(truncated.len()));
    }
}
