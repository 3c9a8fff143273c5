use crate::{ApiError, App, Request};
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use models::{
    Band, BulkDeleteRequest, FrameListQuery, GoesFrame, Id, JobType, Paginated,
    ProcessFramesRequest, Satellite, Sector, Tag,
};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

pub fn router() -> Router<Arc<App>> {
    // Static frame paths are registered before `{frame_id}` so they stay
    // reachable.
    Router::new()
        .route("/api/goes/frames", get(list).delete(bulk_delete))
        .route("/api/goes/frames/stats", get(stats))
        .route("/api/goes/frames/tag", post(bulk_tag))
        .route("/api/goes/frames/process", post(process))
        .route("/api/goes/frames/{frame_id}", get(fetch_one).delete(delete_one))
        .route("/api/goes/frames/{frame_id}/share", post(share))
        .route("/api/goes/latest", get(latest))
}

#[derive(Debug, serde::Serialize)]
struct FrameResponse {
    #[serde(flatten)]
    frame: GoesFrame,
    tags: Vec<Tag>,
}

async fn attach_tags(
    pool: &sqlx::PgPool,
    frames: Vec<GoesFrame>,
) -> Result<Vec<FrameResponse>, ApiError> {
    let ids: Vec<Id> = frames.iter().map(|f| f.id).collect();
    let mut by_frame: HashMap<Id, Vec<Tag>> = HashMap::new();
    for (frame_id, tag) in catalog::tags::for_frames(pool, &ids).await? {
        by_frame.entry(frame_id).or_default().push(tag);
    }
    Ok(frames
        .into_iter()
        .map(|frame| {
            let tags = by_frame.remove(&frame.id).unwrap_or_default();
            FrameResponse { frame, tags }
        })
        .collect())
}

/// List GOES frames with filtering, sorting, pagination.
async fn list(
    State(app): State<Arc<App>>,
    Query(query): Query<FrameListQuery>,
) -> Result<Json<Paginated<FrameResponse>>, ApiError> {
    query
        .validate()
        .map_err(|err| ApiError::Validation(err.to_string().replace('\n', ", ")))?;

    let (frames, total) = catalog::frames::list(&app.pool, &query).await?;
    let items = attach_tags(&app.pool, frames).await?;
    Ok(Json(Paginated::new(items, total, query.page, query.limit)))
}

/// Storage totals per satellite and band.
async fn stats(State(app): State<Arc<App>>) -> Result<Json<serde_json::Value>, ApiError> {
    let rows = catalog::frames::stats(&app.pool).await?;

    let mut total_frames = 0i64;
    let mut total_size = 0i64;
    let mut by_satellite: HashMap<String, serde_json::Value> = HashMap::new();
    let mut by_band: HashMap<String, serde_json::Value> = HashMap::new();

    let mut sat_acc: HashMap<String, (i64, i64)> = HashMap::new();
    let mut band_acc: HashMap<String, (i64, i64)> = HashMap::new();
    for row in &rows {
        total_frames += row.count;
        total_size += row.size;
        let sat = sat_acc.entry(row.satellite.clone()).or_default();
        sat.0 += row.count;
        sat.1 += row.size;
        let band = band_acc.entry(row.band.clone()).or_default();
        band.0 += row.count;
        band.1 += row.size;
    }
    for (name, (count, size)) in sat_acc {
        by_satellite.insert(name, serde_json::json!({"count": count, "size": size}));
    }
    for (name, (count, size)) in band_acc {
        by_band.insert(name, serde_json::json!({"count": count, "size": size}));
    }

    Ok(Json(serde_json::json!({
        "total_frames": total_frames,
        "total_size_bytes": total_size,
        "by_satellite": by_satellite,
        "by_band": by_band,
    })))
}

async fn fetch_one(
    State(app): State<Arc<App>>,
    Path(frame_id): Path<Id>,
) -> Result<Json<FrameResponse>, ApiError> {
    let frame = catalog::frames::fetch(&app.pool, frame_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Frame"))?;
    let mut responses = attach_tags(&app.pool, vec![frame]).await?;
    Ok(Json(responses.remove(0)))
}

async fn remove_frame_files(app: &App, rows: &[(Id, String, Option<String>)]) {
    for (_, file_path, thumbnail_path) in rows {
        // Only paths resolving under the storage root are ever unlinked.
        if let Ok(path) = app.storage.validate(file_path) {
            let _ = tokio::fs::remove_file(path).await;
        }
        if let Some(thumb) = thumbnail_path {
            if let Ok(path) = app.storage.validate(thumb) {
                let _ = tokio::fs::remove_file(path).await;
            }
        }
    }
}

/// Bulk delete frames and their files.
async fn bulk_delete(
    State(app): State<Arc<App>>,
    Request(payload): Request<BulkDeleteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = catalog::frames::delete_many(&app.pool, &payload.ids).await?;
    remove_frame_files(&app, &deleted).await;
    Ok(Json(serde_json::json!({ "deleted": deleted.len() })))
}

async fn delete_one(
    State(app): State<Arc<App>>,
    Path(frame_id): Path<Id>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = catalog::frames::delete_many(&app.pool, &[frame_id]).await?;
    if deleted.is_empty() {
        return Err(ApiError::not_found("Frame"));
    }
    remove_frame_files(&app, &deleted).await;
    Ok(Json(serde_json::json!({ "deleted": frame_id })))
}

#[derive(Debug, serde::Deserialize, Validate)]
struct BulkTagRequest {
    #[validate(length(min = 1))]
    frame_ids: Vec<Id>,
    #[validate(length(min = 1))]
    tag_ids: Vec<Id>,
}

async fn bulk_tag(
    State(app): State<Arc<App>>,
    Request(payload): Request<BulkTagRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    catalog::tags::tag_frames(&app.pool, &payload.frame_ids, &payload.tag_ids).await?;
    Ok(Json(serde_json::json!({ "tagged": payload.frame_ids.len() })))
}

/// Send selected frames to the processing pipeline.
async fn process(
    State(app): State<Arc<App>>,
    Request(payload): Request<ProcessFramesRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let paths = catalog::frames::paths_for(&app.pool, &payload.frame_ids).await?;
    if paths.is_empty() {
        return Err(ApiError::not_found("No frames"));
    }

    let job_id = Id::new();
    let staging = app
        .storage
        .output()
        .join(format!("job_staging_{job_id}"));
    let mut params = serde_json::json!({
        "image_paths": paths,
        "input_path": staging.to_string_lossy(),
    });
    if let serde_json::Value::Object(extra) = payload.params {
        let merged = params.as_object_mut().unwrap();
        for (key, value) in extra {
            merged.insert(key, value);
        }
    }
    catalog::jobs::create(&app.pool, job_id, JobType::ImageProcess, &params, "").await?;

    Ok(Json(serde_json::json!({
        "job_id": job_id,
        "status": "pending",
        "frame_count": paths.len(),
    })))
}

#[derive(Debug, serde::Deserialize)]
struct LatestQuery {
    satellite: Satellite,
    sector: Sector,
    band: Band,
}

/// Most recent catalogued frame for a (satellite, sector, band).
async fn latest(
    State(app): State<Arc<App>>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<FrameResponse>, ApiError> {
    let frame = catalog::frames::latest(&app.pool, query.satellite, query.sector, query.band)
        .await?
        .ok_or_else(|| ApiError::not_found("Frame"))?;
    let mut responses = attach_tags(&app.pool, vec![frame]).await?;
    Ok(Json(responses.remove(0)))
}

#[derive(Debug, serde::Deserialize)]
struct ShareQuery {
    #[serde(default = "ShareQuery::default_hours")]
    hours: i64,
}

impl ShareQuery {
    fn default_hours() -> i64 {
        72
    }
}

/// Create a public share link for a frame.
async fn share(
    State(app): State<Arc<App>>,
    Path(frame_id): Path<Id>,
    Query(query): Query<ShareQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !(1..=24 * 30).contains(&query.hours) {
        return Err(ApiError::Validation(
            "hours must be between 1 and 720".to_string(),
        ));
    }
    if catalog::frames::fetch(&app.pool, frame_id).await?.is_none() {
        return Err(ApiError::not_found("Frame"));
    }

    let link = catalog::share::create(&app.pool, frame_id, query.hours).await?;
    Ok(Json(serde_json::json!({
        "token": link.token,
        "url": format!("/api/shared/{}", link.token),
        "expires_at": link.expires_at,
    })))
}
