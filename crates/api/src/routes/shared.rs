use crate::{ApiError, App};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use catalog::share::Lookup;
use std::sync::Arc;

/// Public share-link endpoints. These skip API-key auth; the token is the
/// credential and expiry is a hard boundary.
pub fn router() -> Router<Arc<App>> {
    Router::new()
        .route("/api/shared/{token}", get(fetch_shared))
        .route("/api/shared/{token}/image", get(fetch_shared_image))
}

async fn resolve(app: &App, token: &str) -> Result<(models::ShareLink, models::GoesFrame), ApiError> {
    match catalog::share::resolve(&app.pool, token).await? {
        Lookup::Valid(link, frame) => Ok((link, frame)),
        Lookup::Expired(_) => Err(ApiError::Gone("Share link has expired".to_string())),
        Lookup::Missing => Err(ApiError::not_found("Share link")),
    }
}

async fn fetch_shared(
    State(app): State<Arc<App>>,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (_, frame) = resolve(&app, &token).await?;
    Ok(Json(serde_json::json!({
        "id": frame.id,
        "satellite": frame.satellite,
        "sector": frame.sector,
        "band": frame.band,
        "capture_time": frame.capture_time,
        "width": frame.width,
        "height": frame.height,
        "file_size": frame.file_size,
    })))
}

async fn fetch_shared_image(
    State(app): State<Arc<App>>,
    Path(token): Path<String>,
) -> Result<axum::response::Response, ApiError> {
    let (_, frame) = resolve(&app, &token).await?;

    let path = app
        .storage
        .validate(&frame.file_path)
        .map_err(|_| ApiError::Forbidden("Access denied".to_string()))?;
    if !path.is_file() {
        return Err(ApiError::not_found("Image file"));
    }

    let bytes = tokio::fs::read(&path).await.map_err(anyhow::Error::from)?;
    Ok(([(axum::http::header::CONTENT_TYPE, "image/png")], bytes).into_response())
}
