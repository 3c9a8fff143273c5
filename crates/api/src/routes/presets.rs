use crate::{ApiError, App, Request};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use models::{
    AnimationPreset, AnimationPresetCreate, CropPreset, CropPresetCreate, CropPresetUpdate,
    FetchPreset, FetchPresetCreate, FetchPresetUpdate, Id, JobType, Preset, PresetCreate,
};
use std::sync::Arc;

pub fn router() -> Router<Arc<App>> {
    Router::new()
        .route("/api/presets", get(list_presets).post(create_preset))
        .route("/api/presets/{preset_id}", axum::routing::delete(delete_preset))
        .route(
            "/api/goes/crop-presets",
            get(list_crop_presets).post(create_crop_preset),
        )
        .route(
            "/api/goes/crop-presets/{preset_id}",
            axum::routing::put(update_crop_preset).delete(delete_crop_preset),
        )
        .route(
            "/api/goes/animation-presets",
            get(list_animation_presets).post(create_animation_preset),
        )
        .route(
            "/api/goes/animation-presets/{preset_id}",
            axum::routing::delete(delete_animation_preset),
        )
        .route(
            "/api/goes/fetch-presets",
            get(list_fetch_presets).post(create_fetch_preset),
        )
        .route(
            "/api/goes/fetch-presets/{preset_id}",
            axum::routing::put(update_fetch_preset).delete(delete_fetch_preset),
        )
        .route("/api/goes/fetch-presets/{preset_id}/run", post(run_fetch_preset))
}

// ── Generic processing presets ──────────────────────────────────────

async fn create_preset(
    State(app): State<Arc<App>>,
    Request(payload): Request<PresetCreate>,
) -> Result<Json<Preset>, ApiError> {
    Ok(Json(
        catalog::presets::create_preset(&app.pool, &payload.name, &payload.params).await?,
    ))
}

async fn list_presets(State(app): State<Arc<App>>) -> Result<Json<Vec<Preset>>, ApiError> {
    Ok(Json(catalog::presets::list_presets(&app.pool).await?))
}

async fn delete_preset(
    State(app): State<Arc<App>>,
    Path(preset_id): Path<Id>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !catalog::presets::delete_preset(&app.pool, preset_id).await? {
        return Err(ApiError::not_found("Preset"));
    }
    Ok(Json(serde_json::json!({ "deleted": preset_id })))
}

// ── Crop presets ────────────────────────────────────────────────────

async fn create_crop_preset(
    State(app): State<Arc<App>>,
    Request(payload): Request<CropPresetCreate>,
) -> Result<Json<CropPreset>, ApiError> {
    let preset = catalog::presets::create_crop_preset(
        &app.pool,
        &payload.name,
        payload.x,
        payload.y,
        payload.width,
        payload.height,
    )
    .await?;
    Ok(Json(preset))
}

async fn list_crop_presets(State(app): State<Arc<App>>) -> Result<Json<Vec<CropPreset>>, ApiError> {
    Ok(Json(catalog::presets::list_crop_presets(&app.pool).await?))
}

async fn update_crop_preset(
    State(app): State<Arc<App>>,
    Path(preset_id): Path<Id>,
    Request(payload): Request<CropPresetUpdate>,
) -> Result<Json<CropPreset>, ApiError> {
    let preset = catalog::presets::update_crop_preset(
        &app.pool,
        preset_id,
        payload.name.as_deref(),
        payload.x,
        payload.y,
        payload.width,
        payload.height,
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Crop preset"))?;
    Ok(Json(preset))
}

async fn delete_crop_preset(
    State(app): State<Arc<App>>,
    Path(preset_id): Path<Id>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !catalog::presets::delete_crop_preset(&app.pool, preset_id).await? {
        return Err(ApiError::not_found("Crop preset"));
    }
    Ok(Json(serde_json::json!({ "deleted": preset_id })))
}

// ── Animation presets ───────────────────────────────────────────────

async fn create_animation_preset(
    State(app): State<Arc<App>>,
    Request(payload): Request<AnimationPresetCreate>,
) -> Result<Json<AnimationPreset>, ApiError> {
    let preset =
        catalog::presets::create_animation_preset(&app.pool, &payload.name, &payload.options)
            .await?;
    Ok(Json(preset))
}

async fn list_animation_presets(
    State(app): State<Arc<App>>,
) -> Result<Json<Vec<AnimationPreset>>, ApiError> {
    Ok(Json(
        catalog::presets::list_animation_presets(&app.pool).await?,
    ))
}

async fn delete_animation_preset(
    State(app): State<Arc<App>>,
    Path(preset_id): Path<Id>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !catalog::presets::delete_animation_preset(&app.pool, preset_id).await? {
        return Err(ApiError::not_found("Animation preset"));
    }
    Ok(Json(serde_json::json!({ "deleted": preset_id })))
}

// ── Fetch presets ───────────────────────────────────────────────────

async fn create_fetch_preset(
    State(app): State<Arc<App>>,
    Request(payload): Request<FetchPresetCreate>,
) -> Result<Json<FetchPreset>, ApiError> {
    let preset = catalog::presets::create_fetch_preset(
        &app.pool,
        &payload.name,
        payload.satellite,
        payload.sector,
        payload.band,
        &payload.description,
    )
    .await?;
    Ok(Json(preset))
}

async fn list_fetch_presets(
    State(app): State<Arc<App>>,
) -> Result<Json<Vec<FetchPreset>>, ApiError> {
    Ok(Json(catalog::presets::list_fetch_presets(&app.pool).await?))
}

async fn update_fetch_preset(
    State(app): State<Arc<App>>,
    Path(preset_id): Path<Id>,
    Request(payload): Request<FetchPresetUpdate>,
) -> Result<Json<FetchPreset>, ApiError> {
    let preset = catalog::presets::update_fetch_preset(
        &app.pool,
        preset_id,
        payload.name.as_deref(),
        payload.satellite,
        payload.sector,
        payload.band,
        payload.description.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Fetch preset"))?;
    Ok(Json(preset))
}

async fn delete_fetch_preset(
    State(app): State<Arc<App>>,
    Path(preset_id): Path<Id>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !catalog::presets::delete_fetch_preset(&app.pool, preset_id).await? {
        return Err(ApiError::not_found("Fetch preset"));
    }
    Ok(Json(serde_json::json!({ "deleted": preset_id })))
}

/// Execute a preset immediately, fetching the last hour of data.
async fn run_fetch_preset(
    State(app): State<Arc<App>>,
    Path(preset_id): Path<Id>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let preset = catalog::presets::fetch_fetch_preset(&app.pool, preset_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Fetch preset"))?;

    let now = Utc::now();
    let job_id = Id::new();
    let params = serde_json::json!({
        "satellite": preset.satellite,
        "sector": preset.sector,
        "band": preset.band,
        "start_time": now - Duration::hours(1),
        "end_time": now,
        "preset_id": preset.id,
    });
    catalog::jobs::create(&app.pool, job_id, JobType::GoesFetch, &params, "").await?;

    Ok(Json(serde_json::json!({
        "job_id": job_id,
        "status": "pending",
        "preset": preset.name,
    })))
}
