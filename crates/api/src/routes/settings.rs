use crate::{ApiError, App, Request};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use models::{AppSettings, SettingsUpdate};
use std::sync::Arc;

pub fn router() -> Router<Arc<App>> {
    Router::new().route("/api/settings", get(fetch).put(update))
}

async fn fetch(State(app): State<Arc<App>>) -> Json<AppSettings> {
    Json(catalog::settings::load(&app.pool).await)
}

async fn update(
    State(app): State<Arc<App>>,
    Request(payload): Request<SettingsUpdate>,
) -> Result<Json<AppSettings>, ApiError> {
    let mut settings = catalog::settings::load(&app.pool).await;
    if let Some(max_frames) = payload.max_frames_per_fetch {
        settings.max_frames_per_fetch = max_frames;
    }
    if let Some(webhook_url) = payload.webhook_url {
        settings.webhook_url = Some(webhook_url);
    }
    catalog::settings::store(&app.pool, &settings).await?;
    Ok(Json(settings))
}
