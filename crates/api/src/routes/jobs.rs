use crate::{ApiError, App, Request};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use models::{Id, Job, JobLog, JobStatus, JobType, Paginated, ProgressEvent};
use std::sync::Arc;
use validator::Validate;

pub fn router() -> Router<Arc<App>> {
    Router::new()
        .route("/api/jobs", get(list))
        .route("/api/jobs/bulk", axum::routing::delete(bulk_delete))
        .route("/api/jobs/cleanup-stale", post(cleanup_stale))
        .route(
            "/api/jobs/{job_id}",
            get(fetch_one).patch(patch_one).delete(delete_one),
        )
        .route("/api/jobs/{job_id}/cancel", post(cancel))
        .route("/api/jobs/{job_id}/logs", get(logs))
        .route("/api/jobs/{job_id}/download", get(download))
}

#[derive(Debug, serde::Deserialize)]
struct JobListQuery {
    status: Option<JobStatus>,
    #[serde(rename = "type")]
    job_type: Option<JobType>,
    #[serde(default = "JobListQuery::default_page")]
    page: u32,
    #[serde(default = "JobListQuery::default_limit")]
    limit: u32,
}

impl JobListQuery {
    fn default_page() -> u32 {
        1
    }
    fn default_limit() -> u32 {
        50
    }
}

async fn list(
    State(app): State<Arc<App>>,
    Query(query): Query<JobListQuery>,
) -> Result<Json<Paginated<Job>>, ApiError> {
    if query.page < 1 || !(1..=200).contains(&query.limit) {
        return Err(ApiError::Validation(
            "page must be >= 1 and limit in 1..=200".to_string(),
        ));
    }
    let offset = (i64::from(query.page) - 1) * i64::from(query.limit);
    let (jobs, total) = catalog::jobs::list(
        &app.pool,
        query.status,
        query.job_type,
        query.limit as i64,
        offset,
    )
    .await?;
    Ok(Json(Paginated::new(jobs, total, query.page, query.limit)))
}

async fn fetch_one(
    State(app): State<Arc<App>>,
    Path(job_id): Path<Id>,
) -> Result<Json<Job>, ApiError> {
    let job = catalog::jobs::fetch(&app.pool, job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job"))?;
    Ok(Json(job))
}

#[derive(Debug, serde::Deserialize, Validate)]
struct JobPatch {
    #[validate(length(min = 1, max = 500))]
    status_message: Option<String>,
}

async fn patch_one(
    State(app): State<Arc<App>>,
    Path(job_id): Path<Id>,
    Request(payload): Request<JobPatch>,
) -> Result<Json<Job>, ApiError> {
    if let Some(message) = &payload.status_message {
        if catalog::jobs::set_status_message(&app.pool, job_id, message).await? == 0 {
            return Err(ApiError::not_found("Job"));
        }
    }
    let job = catalog::jobs::fetch(&app.pool, job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job"))?;
    Ok(Json(job))
}

async fn remove_job_files(app: &App, job: &Job) {
    if !job.output_path.is_empty() {
        // Only paths resolving under the storage root are ever removed.
        if let Ok(path) = app.storage.validate(&job.output_path) {
            let _ = tokio::fs::remove_dir_all(&path).await;
            let _ = tokio::fs::remove_file(&path).await;
        }
    }
    match catalog::frames::delete_by_source_job(&app.pool, job.id).await {
        Ok(frames) => {
            for (_, file_path, thumbnail_path) in frames {
                if let Ok(path) = app.storage.validate(&file_path) {
                    let _ = tokio::fs::remove_file(path).await;
                }
                if let Some(thumb) = thumbnail_path {
                    if let Ok(path) = app.storage.validate(&thumb) {
                        let _ = tokio::fs::remove_file(path).await;
                    }
                }
            }
        }
        Err(error) => {
            tracing::warn!(job_id = %job.id, %error, "failed to delete job frames");
        }
    }
}

#[derive(Debug, serde::Deserialize, Default)]
struct DeleteQuery {
    #[serde(default)]
    delete_files: bool,
}

/// Delete a job; with `delete_files=true` its output directory and produced
/// frames go too.
async fn delete_one(
    State(app): State<Arc<App>>,
    Path(job_id): Path<Id>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    // Frames reference the job row; collect files first, delete row last.
    let job = catalog::jobs::fetch(&app.pool, job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job"))?;
    if query.delete_files {
        remove_job_files(&app, &job).await;
    }
    catalog::jobs::delete(&app.pool, job_id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, serde::Deserialize, Validate)]
struct BulkJobDelete {
    #[validate(length(min = 1))]
    ids: Vec<Id>,
    #[serde(default)]
    delete_files: bool,
}

async fn bulk_delete(
    State(app): State<Arc<App>>,
    Request(payload): Request<BulkJobDelete>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if payload.delete_files {
        for id in &payload.ids {
            if let Some(job) = catalog::jobs::fetch(&app.pool, *id).await? {
                remove_job_files(&app, &job).await;
            }
        }
    }
    let deleted = catalog::jobs::delete_many(&app.pool, &payload.ids).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted.len() })))
}

/// Cancel a pending or processing job: best-effort revoke to the worker,
/// then the durable cancelled transition.
async fn cancel(
    State(app): State<Arc<App>>,
    Path(job_id): Path<Id>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let job = catalog::jobs::fetch(&app.pool, job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job"))?;
    if job.status.is_terminal() {
        return Err(ApiError::BadRequest(format!(
            "Job is already {} and cannot be cancelled",
            job.status
        )));
    }

    if let Some(task_id) = job.task_id {
        app.bus.publish_revoke(task_id).await;
    }

    let cancelled = catalog::jobs::cancel(&app.pool, job_id).await?;
    let Some(cancelled) = cancelled else {
        // Lost the race against a terminal transition.
        return Err(ApiError::BadRequest(
            "Job completed before it could be cancelled".to_string(),
        ));
    };

    app.bus
        .publish_progress(&ProgressEvent {
            job_id,
            progress: cancelled.progress,
            message: "Cancelled by request".to_string(),
            status: JobStatus::Cancelled,
        })
        .await;

    Ok(Json(serde_json::json!({ "cancelled": true })))
}

async fn logs(
    State(app): State<Arc<App>>,
    Path(job_id): Path<Id>,
) -> Result<Json<Vec<JobLog>>, ApiError> {
    if catalog::jobs::fetch(&app.pool, job_id).await?.is_none() {
        return Err(ApiError::not_found("Job"));
    }
    Ok(Json(catalog::jobs::logs(&app.pool, job_id).await?))
}

/// Force a stale-job sweep.
async fn cleanup_stale(State(app): State<Arc<App>>) -> Result<Json<serde_json::Value>, ApiError> {
    let reaped = catalog::jobs::reap_stale_now(&app.pool).await?;
    Ok(Json(serde_json::json!({ "reaped": reaped })))
}

/// Download a job's output when it is a single file. Directory outputs are
/// served file-by-file through the frames API instead.
async fn download(
    State(app): State<Arc<App>>,
    Path(job_id): Path<Id>,
) -> Result<axum::response::Response, ApiError> {
    use axum::response::IntoResponse;

    let job = catalog::jobs::fetch(&app.pool, job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job"))?;
    if job.output_path.is_empty() {
        return Err(ApiError::not_found("Job output"));
    }

    let path = app
        .storage
        .validate(&job.output_path)
        .map_err(|_| ApiError::Forbidden("output path escapes the storage root".to_string()))?;
    if !path.is_file() {
        return Err(ApiError::BadRequest(
            "job output is a directory; download individual frames instead".to_string(),
        ));
    }

    let bytes = tokio::fs::read(&path).await.map_err(anyhow::Error::from)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    Ok((
        [
            (
                axum::http::header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
            (
                axum::http::header::CONTENT_TYPE,
                "application/octet-stream".to_string(),
            ),
        ],
        bytes,
    )
        .into_response())
}
