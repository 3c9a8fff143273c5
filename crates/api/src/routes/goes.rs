use crate::{ApiError, App, Request};
use axum::extract::{ConnectInfo, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use models::{Band, FetchRequest, Id, JobType, Satellite, Sector};
use std::net::SocketAddr;
use std::sync::Arc;

fn rate_limit(app: &App, addr: SocketAddr, operation: &'static str, limit: u32) -> Result<(), ApiError> {
    if app.rate_check(addr.ip(), operation, limit) {
        Ok(())
    } else {
        Err(ApiError::RateLimited(format!(
            "rate limit of {limit}/minute exceeded for {operation}"
        )))
    }
}

pub fn router() -> Router<Arc<App>> {
    Router::new()
        .route("/api/goes/products", get(products))
        .route("/api/goes/fetch", post(fetch))
        .route("/api/goes/backfill", post(backfill))
        .route("/api/goes/fetch-composite", post(fetch_composite))
        .route("/api/goes/gaps", get(gaps))
        .route("/api/goes/preview", get(preview))
}

/// Static catalog of satellites, sectors (with cadence), and bands.
async fn products() -> Json<serde_json::Value> {
    let satellites: Vec<&str> = Satellite::ALL.iter().map(|s| s.as_str()).collect();
    let satellite_availability: serde_json::Map<String, serde_json::Value> = Satellite::ALL
        .iter()
        .map(|s| {
            (
                s.as_str().to_string(),
                serde_json::to_value(ingest::goes::availability(*s)).unwrap(),
            )
        })
        .collect();
    let sectors: Vec<serde_json::Value> = Sector::ALL
        .iter()
        .map(|s| {
            serde_json::json!({
                "id": s.as_str(),
                "name": s.as_str(),
                "product": ingest::goes::product(*s),
                "cadence_minutes": s.cadence_minutes(),
            })
        })
        .collect();
    let bands: Vec<serde_json::Value> = Band::all()
        .map(|b| {
            serde_json::json!({
                "id": b.to_string(),
                "description": ingest::goes::band_description(b),
            })
        })
        .collect();

    Json(serde_json::json!({
        "satellites": satellites,
        "satellite_availability": satellite_availability,
        "sectors": sectors,
        "bands": bands,
        "default_satellite": "GOES-19",
    }))
}

fn enqueue_response(job_id: Id, message: &str) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "job_id": job_id,
        "status": "pending",
        "message": message,
    }))
}

/// Kick off a GOES data fetch job.
async fn fetch(
    State(app): State<Arc<App>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Request(payload): Request<FetchRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    rate_limit(&app, addr, "fetch", 5)?;
    let job_id = Id::new();
    let params = serde_json::to_value(&payload).map_err(anyhow::Error::from)?;
    catalog::jobs::create(&app.pool, job_id, JobType::GoesFetch, &params, "").await?;
    Ok(enqueue_response(job_id, "GOES fetch job created"))
}

/// Fill detected gaps (one-shot, not automatic).
async fn backfill(
    State(app): State<Arc<App>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Request(payload): Request<models::BackfillRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    rate_limit(&app, addr, "backfill", 2)?;
    let job_id = Id::new();
    let params = serde_json::to_value(&payload).map_err(anyhow::Error::from)?;
    catalog::jobs::create(&app.pool, job_id, JobType::GoesBackfill, &params, "").await?;
    Ok(enqueue_response(job_id, "Backfill job created"))
}

/// Fetch every band of a composite recipe, then auto-queue generation.
async fn fetch_composite(
    State(app): State<Arc<App>>,
    Request(payload): Request<models::FetchCompositeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if media::recipe(&payload.recipe).is_none() {
        let known: Vec<&str> = media::RECIPES.iter().map(|r| r.name).collect();
        return Err(ApiError::Validation(format!(
            "unknown recipe {:?}; valid recipes are {known:?}",
            payload.recipe
        )));
    }
    let job_id = Id::new();
    let params = serde_json::to_value(&payload).map_err(anyhow::Error::from)?;
    catalog::jobs::create(&app.pool, job_id, JobType::CompositeFetch, &params, "").await?;
    Ok(enqueue_response(job_id, "Composite fetch job created"))
}

#[derive(Debug, serde::Deserialize)]
struct GapsQuery {
    satellite: Option<Satellite>,
    band: Option<Band>,
    sector: Option<Sector>,
    #[serde(default = "GapsQuery::default_interval")]
    expected_interval: f64,
}

impl GapsQuery {
    fn default_interval() -> f64 {
        10.0
    }
}

/// Run gap detection and return coverage stats.
async fn gaps(
    State(app): State<Arc<App>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<GapsQuery>,
) -> Result<Json<catalog::gaps::CoverageStats>, ApiError> {
    rate_limit(&app, addr, "gaps", 10)?;
    if !(0.5..=60.0).contains(&query.expected_interval) {
        return Err(ApiError::Validation(
            "expected_interval must be between 0.5 and 60 minutes".to_string(),
        ));
    }
    let stats = catalog::gaps::detect(
        &app.pool,
        query.satellite,
        query.band,
        query.sector,
        query.expected_interval,
        catalog::gaps::DEFAULT_TOLERANCE,
    )
    .await?;
    Ok(Json(stats))
}

#[derive(Debug, serde::Deserialize)]
struct PreviewQuery {
    satellite: Satellite,
    sector: Sector,
    band: Band,
    time: DateTime<Utc>,
}

/// Fetch a single frame preview straight from the object store.
async fn preview(
    State(app): State<Arc<App>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<PreviewQuery>,
) -> Result<axum::response::Response, ApiError> {
    rate_limit(&app, addr, "preview", 10)?;
    let bytes = ingest::fetch_preview(
        &app.client,
        &app.storage,
        query.satellite,
        query.sector,
        query.band,
        query.time,
    )
    .await
    .map_err(|error| match error {
        ingest::PipelineError::CircuitOpen => {
            ApiError::BadRequest("object store is unavailable (circuit open)".to_string())
        }
        other => ApiError::Internal(other.into()),
    })?;

    match bytes {
        Some(bytes) => Ok((
            [(axum::http::header::CONTENT_TYPE, "image/png")],
            bytes,
        )
            .into_response()),
        None => Err(ApiError::NotFound(
            "No frame found near the requested time".to_string(),
        )),
    }
}
