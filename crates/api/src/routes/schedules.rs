use crate::{ApiError, App, Request};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use models::{
    CleanupRule, CleanupRuleCreate, CleanupRuleUpdate, FetchSchedule, Id, ScheduleCreate,
    ScheduleUpdate,
};
use std::sync::Arc;

pub fn router() -> Router<Arc<App>> {
    Router::new()
        .route("/api/goes/schedules", get(list_schedules).post(create_schedule))
        .route(
            "/api/goes/schedules/{schedule_id}",
            axum::routing::put(update_schedule).delete(delete_schedule),
        )
        .route("/api/goes/schedules/{schedule_id}/toggle", post(toggle_schedule))
        .route(
            "/api/goes/cleanup-rules",
            get(list_rules).post(create_rule),
        )
        .route(
            "/api/goes/cleanup-rules/{rule_id}",
            axum::routing::put(update_rule).delete(delete_rule),
        )
        .route("/api/goes/cleanup/preview", get(cleanup_preview))
        .route("/api/goes/cleanup/run", post(cleanup_run))
}

// ── Schedules ───────────────────────────────────────────────────────

async fn create_schedule(
    State(app): State<Arc<App>>,
    Request(payload): Request<ScheduleCreate>,
) -> Result<Json<FetchSchedule>, ApiError> {
    if catalog::presets::fetch_fetch_preset(&app.pool, payload.preset_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Fetch preset"));
    }
    let schedule = catalog::schedules::create(
        &app.pool,
        &payload.name,
        payload.preset_id,
        payload.interval_minutes,
        payload.is_active,
    )
    .await?;
    Ok(Json(schedule))
}

async fn list_schedules(State(app): State<Arc<App>>) -> Result<Json<Vec<FetchSchedule>>, ApiError> {
    Ok(Json(catalog::schedules::list(&app.pool).await?))
}

async fn update_schedule(
    State(app): State<Arc<App>>,
    Path(schedule_id): Path<Id>,
    Request(payload): Request<ScheduleUpdate>,
) -> Result<Json<FetchSchedule>, ApiError> {
    if let Some(preset_id) = payload.preset_id {
        if catalog::presets::fetch_fetch_preset(&app.pool, preset_id)
            .await?
            .is_none()
        {
            return Err(ApiError::not_found("Fetch preset"));
        }
    }
    let schedule = catalog::schedules::update(
        &app.pool,
        schedule_id,
        payload.name.as_deref(),
        payload.preset_id,
        payload.interval_minutes,
        payload.is_active,
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Schedule"))?;
    Ok(Json(schedule))
}

async fn delete_schedule(
    State(app): State<Arc<App>>,
    Path(schedule_id): Path<Id>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !catalog::schedules::delete(&app.pool, schedule_id).await? {
        return Err(ApiError::not_found("Schedule"));
    }
    Ok(Json(serde_json::json!({ "deleted": schedule_id })))
}

/// Flip `is_active`, computing or clearing `next_run_at`.
async fn toggle_schedule(
    State(app): State<Arc<App>>,
    Path(schedule_id): Path<Id>,
) -> Result<Json<FetchSchedule>, ApiError> {
    let schedule = catalog::schedules::toggle(&app.pool, schedule_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Schedule"))?;
    Ok(Json(schedule))
}

// ── Cleanup rules ───────────────────────────────────────────────────

async fn create_rule(
    State(app): State<Arc<App>>,
    Request(payload): Request<CleanupRuleCreate>,
) -> Result<Json<CleanupRule>, ApiError> {
    let rule = catalog::cleanup::create_rule(
        &app.pool,
        &payload.name,
        payload.rule_type,
        payload.value,
        payload.protect_collections,
        payload.is_active,
    )
    .await?;
    Ok(Json(rule))
}

async fn list_rules(State(app): State<Arc<App>>) -> Result<Json<Vec<CleanupRule>>, ApiError> {
    Ok(Json(catalog::cleanup::list_rules(&app.pool).await?))
}

async fn update_rule(
    State(app): State<Arc<App>>,
    Path(rule_id): Path<Id>,
    Request(payload): Request<CleanupRuleUpdate>,
) -> Result<Json<CleanupRule>, ApiError> {
    let rule = catalog::cleanup::update_rule(
        &app.pool,
        rule_id,
        payload.name.as_deref(),
        payload.rule_type,
        payload.value,
        payload.protect_collections,
        payload.is_active,
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Cleanup rule"))?;
    Ok(Json(rule))
}

async fn delete_rule(
    State(app): State<Arc<App>>,
    Path(rule_id): Path<Id>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !catalog::cleanup::delete_rule(&app.pool, rule_id).await? {
        return Err(ApiError::not_found("Cleanup rule"));
    }
    Ok(Json(serde_json::json!({ "deleted": rule_id })))
}

/// Dry run: what the active rules would delete.
async fn cleanup_preview(
    State(app): State<Arc<App>>,
) -> Result<Json<catalog::cleanup::Preview>, ApiError> {
    Ok(Json(catalog::cleanup::preview(&app.pool).await?))
}

/// Destructive retention run.
async fn cleanup_run(
    State(app): State<Arc<App>>,
) -> Result<Json<catalog::cleanup::RunOutcome>, ApiError> {
    Ok(Json(catalog::cleanup::run(&app.pool).await?))
}
