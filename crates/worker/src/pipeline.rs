//! The ordered mastering pipeline for one job.
//!
//! download → master → preview → upload both outputs. All intermediate
//! files live in an isolated scratch directory that is removed when the
//! pipeline returns, success or failure.

use std::path::Path;

use resona_core::jobs::{master_object_key, preview_object_key};
use resona_core::types::DbId;
use resona_storage::{ObjectStorage, StorageError};

use crate::transform::{self, TransformError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("scratch directory error: {0}")]
    Scratch(#[from] std::io::Error),
}

/// Object keys of a completed pipeline's outputs.
#[derive(Debug, Clone)]
pub struct JobOutputs {
    pub result_object_key: String,
    pub preview_object_key: String,
}

/// Run the full pipeline for one job.
///
/// Output keys are derived from the job id, so re-running the same job
/// (e.g. on redelivery) overwrites the same objects.
pub async fn run_job(
    storage: &ObjectStorage,
    job_id: DbId,
    object_key: &str,
) -> Result<JobOutputs, PipelineError> {
    // Scratch dir is removed on drop, regardless of outcome.
    let scratch = tempfile::tempdir()?;
    let input_path = scratch.path().join("input");
    let master_path = scratch.path().join("master.wav");
    let preview_path = scratch.path().join("preview.mp3");

    let result_key = master_object_key(job_id);
    let preview_key = preview_object_key(job_id);

    storage.download(object_key, &input_path).await?;
    master(&input_path, &master_path).await?;
    preview(&master_path, &preview_path).await?;
    storage.upload(&master_path, &result_key, "audio/wav").await?;
    storage
        .upload(&preview_path, &preview_key, "audio/mpeg")
        .await?;

    Ok(JobOutputs {
        result_object_key: result_key,
        preview_object_key: preview_key,
    })
}

/// Loudness-normalize the source into a fixed-format WAV master.
async fn master(input: &Path, output: &Path) -> Result<(), TransformError> {
    let args = transform::master_args(input, output);
    transform::run_ffmpeg("mastering transform", &args).await
}

/// Render the MP3 preview clip from the mastered file.
async fn preview(input: &Path, output: &Path) -> Result<(), TransformError> {
    let args = transform::preview_args(input, output);
    transform::run_ffmpeg("preview transform", &args).await
}
