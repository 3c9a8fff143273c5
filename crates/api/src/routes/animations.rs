use crate::{ApiError, App, Request};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use models::{
    Animation, AnimationBatch, AnimationCreate, AnimationFromRange, AnimationOptions,
    AnimationRecent, Composite, CompositeCreateRequest, Id, JobType, Paginated,
};
use std::sync::Arc;

pub fn router() -> Router<Arc<App>> {
    Router::new()
        .route("/api/goes/animations", get(list).post(create))
        .route("/api/goes/animations/from-range", post(from_range))
        .route("/api/goes/animations/recent", post(recent))
        .route("/api/goes/animations/batch", post(batch))
        .route(
            "/api/goes/animations/{animation_id}",
            get(fetch_one).delete(delete_one),
        )
        .route("/api/goes/composites", get(list_composites).post(create_composite))
        .route("/api/goes/composites/{composite_id}", get(fetch_composite))
}

/// Create the animation artifact + its job in one transaction and return
/// the pending artifact. The job row committing is what dispatches it.
async fn enqueue_animation(
    app: &App,
    name: &str,
    frame_ids: Vec<Id>,
    options: &AnimationOptions,
) -> Result<Animation, ApiError> {
    if frame_ids.is_empty() {
        return Err(ApiError::BadRequest(
            "No frames matched the given criteria".to_string(),
        ));
    }
    if let Some(preset_id) = options.crop_preset_id {
        if catalog::presets::fetch_crop_preset(&app.pool, preset_id)
            .await?
            .is_none()
        {
            return Err(ApiError::not_found("Crop preset"));
        }
    }

    let job_id = Id::new();
    let animation_id = Id::new();
    let params = serde_json::json!({
        "animation_id": animation_id,
        "frame_ids": frame_ids,
        "fps": options.fps,
        "format": options.format,
        "quality": options.quality,
        "resolution": options.resolution,
        "loop_style": options.loop_style,
        "scale": options.scale,
        "crop_preset_id": options.crop_preset_id,
    });

    let mut txn = app.pool.begin().await.map_err(ApiError::from)?;
    catalog::jobs::create(&mut *txn, job_id, JobType::Animation, &params, "").await?;
    let animation = catalog::artifacts::create_animation(
        &mut *txn,
        animation_id,
        name,
        frame_ids.len() as i32,
        options,
        job_id,
    )
    .await?;
    txn.commit().await.map_err(ApiError::from)?;

    Ok(animation)
}

/// Create an animation from explicit frame ids or a filter query.
async fn create(
    State(app): State<Arc<App>>,
    Request(payload): Request<AnimationCreate>,
) -> Result<Json<Animation>, ApiError> {
    let frame_ids = if !payload.frame_ids.is_empty() {
        payload.frame_ids.clone()
    } else {
        let query = models::FrameListQuery {
            page: 1,
            // Internal listing, not a client page; animations may span far
            // more frames than one API page.
            limit: 10_000,
            satellite: payload.satellite,
            band: payload.band,
            sector: payload.sector,
            start_date: payload.start_date,
            end_date: payload.end_date,
            collection_id: payload.collection_id,
            tag: None,
            sort: models::FrameSort::CaptureTime,
            order: models::SortOrder::Asc,
        };
        let (frames, _) = catalog::frames::list(&app.pool, &query).await?;
        frames.into_iter().map(|f| f.id).collect()
    };

    let animation = enqueue_animation(&app, &payload.name, frame_ids, &payload.options).await?;
    Ok(Json(animation))
}

async fn from_range(
    State(app): State<Arc<App>>,
    Request(payload): Request<AnimationFromRange>,
) -> Result<Json<Animation>, ApiError> {
    let frame_ids = catalog::frames::ids_in_range(
        &app.pool,
        payload.satellite,
        payload.sector,
        payload.band,
        payload.start_time,
        payload.end_time,
    )
    .await?;
    let animation = enqueue_animation(&app, &payload.name, frame_ids, &payload.options).await?;
    Ok(Json(animation))
}

async fn recent(
    State(app): State<Arc<App>>,
    Request(payload): Request<AnimationRecent>,
) -> Result<Json<Animation>, ApiError> {
    let end = Utc::now();
    let start = end - Duration::hours(payload.hours);
    let frame_ids = catalog::frames::ids_in_range(
        &app.pool,
        payload.satellite,
        payload.sector,
        payload.band,
        start,
        end,
    )
    .await?;
    let animation = enqueue_animation(&app, &payload.name, frame_ids, &payload.options).await?;
    Ok(Json(animation))
}

/// Queue several range animations in one call; each item stands alone.
async fn batch(
    State(app): State<Arc<App>>,
    Request(payload): Request<AnimationBatch>,
) -> Result<Json<Vec<Animation>>, ApiError> {
    let mut animations = Vec::with_capacity(payload.items.len());
    for item in &payload.items {
        let frame_ids = catalog::frames::ids_in_range(
            &app.pool,
            item.satellite,
            item.sector,
            item.band,
            item.start_time,
            item.end_time,
        )
        .await?;
        animations.push(enqueue_animation(&app, &item.name, frame_ids, &item.options).await?);
    }
    Ok(Json(animations))
}

#[derive(Debug, serde::Deserialize)]
struct PageQuery {
    #[serde(default = "PageQuery::default_page")]
    page: u32,
    #[serde(default = "PageQuery::default_limit")]
    limit: u32,
}

impl PageQuery {
    fn default_page() -> u32 {
        1
    }
    fn default_limit() -> u32 {
        50
    }

    fn validated(&self) -> Result<(i64, i64), ApiError> {
        if self.page < 1 || !(1..=200).contains(&self.limit) {
            return Err(ApiError::Validation(
                "page must be >= 1 and limit in 1..=200".to_string(),
            ));
        }
        Ok((
            i64::from(self.limit),
            (i64::from(self.page) - 1) * i64::from(self.limit),
        ))
    }
}

async fn list(
    State(app): State<Arc<App>>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Animation>>, ApiError> {
    let (limit, offset) = page.validated()?;
    let (animations, total) = catalog::artifacts::list_animations(&app.pool, limit, offset).await?;
    Ok(Json(Paginated::new(animations, total, page.page, page.limit)))
}

async fn fetch_one(
    State(app): State<Arc<App>>,
    Path(animation_id): Path<Id>,
) -> Result<Json<Animation>, ApiError> {
    let animation = catalog::artifacts::fetch_animation(&app.pool, animation_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Animation"))?;
    Ok(Json(animation))
}

async fn delete_one(
    State(app): State<Arc<App>>,
    Path(animation_id): Path<Id>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let animation = catalog::artifacts::delete_animation(&app.pool, animation_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Animation"))?;

    if let Some(output_path) = &animation.output_path {
        if let Ok(path) = app.storage.validate(output_path) {
            let _ = tokio::fs::remove_file(path).await;
        }
    }
    Ok(Json(serde_json::json!({ "deleted": animation_id })))
}

// ── Composites ──────────────────────────────────────────────────────

/// Queue generation of one composite from already-catalogued frames.
async fn create_composite(
    State(app): State<Arc<App>>,
    Request(payload): Request<CompositeCreateRequest>,
) -> Result<Json<Composite>, ApiError> {
    let Some(recipe) = media::recipe(&payload.recipe) else {
        let known: Vec<&str> = media::RECIPES.iter().map(|r| r.name).collect();
        return Err(ApiError::Validation(format!(
            "unknown recipe {:?}; valid recipes are {known:?}",
            payload.recipe
        )));
    };

    let job_id = Id::new();
    let composite_id = Id::new();
    let params = serde_json::json!({
        "composite_id": composite_id,
        "recipe": recipe.name,
        "satellite": payload.satellite,
        "sector": payload.sector,
        "capture_time": payload.capture_time,
    });

    let mut txn = app.pool.begin().await.map_err(ApiError::from)?;
    catalog::jobs::create(&mut *txn, job_id, JobType::CompositeGenerate, &params, "").await?;
    let composite = catalog::artifacts::create_composite(
        &mut *txn,
        composite_id,
        recipe.display_name,
        recipe.name,
        payload.satellite,
        payload.sector,
        payload.capture_time,
        job_id,
    )
    .await?;
    txn.commit().await.map_err(ApiError::from)?;

    Ok(Json(composite))
}

async fn list_composites(
    State(app): State<Arc<App>>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Composite>>, ApiError> {
    let (limit, offset) = page.validated()?;
    let (composites, total) = catalog::artifacts::list_composites(&app.pool, limit, offset).await?;
    Ok(Json(Paginated::new(composites, total, page.page, page.limit)))
}

async fn fetch_composite(
    State(app): State<Arc<App>>,
    Path(composite_id): Path<Id>,
) -> Result<Json<Composite>, ApiError> {
    let composite = catalog::artifacts::fetch_composite(&app.pool, composite_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Composite"))?;
    Ok(Json(composite))
}
