//! Handlers for the `/jobs` resource.
//!
//! All endpoints require authentication via [`AuthUser`]. Jobs are scoped
//! to their owner: a job belonging to someone else is indistinguishable
//! from one that does not exist.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use resona_core::error::CoreError;
use resona_core::types::DbId;
use resona_db::models::SubmitJob;
use resona_db::repositories::JobRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/jobs
///
/// Submit a new mastering job. Returns 201 with the created job in
/// `queued` status; a `job.start` message is published for the worker
/// pool.
pub async fn submit_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<SubmitJob>,
) -> AppResult<impl IntoResponse> {
    let job = state.producer.submit(auth.owner_id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

/// GET /api/v1/jobs
///
/// List the caller's jobs, newest first.
pub async fn list_jobs(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let jobs = JobRepo::list_by_owner(&state.pool, auth.owner_id).await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
///
/// Get a single job by ID. Someone else's job returns 404, not 403.
pub async fn get_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = JobRepo::find_owned(&state.pool, job_id, auth.owner_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))?;

    Ok(Json(DataResponse { data: job }))
}
