use crate::{ApiError, App, Request};
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use models::{Id, Tag, TagCreate};
use std::sync::Arc;

pub fn router() -> Router<Arc<App>> {
    Router::new()
        .route("/api/goes/tags", get(list).post(create))
        .route("/api/goes/tags/{tag_id}", axum::routing::delete(delete_one))
}

async fn create(
    State(app): State<Arc<App>>,
    Request(payload): Request<TagCreate>,
) -> Result<Json<Tag>, ApiError> {
    // Name is globally unique; the database constraint surfaces as 409.
    let tag = catalog::tags::create(&app.pool, &payload.name, &payload.color).await?;
    Ok(Json(tag))
}

async fn list(State(app): State<Arc<App>>) -> Result<Json<Vec<Tag>>, ApiError> {
    Ok(Json(catalog::tags::list(&app.pool).await?))
}

async fn delete_one(
    State(app): State<Arc<App>>,
    Path(tag_id): Path<Id>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !catalog::tags::delete(&app.pool, tag_id).await? {
        return Err(ApiError::not_found("Tag"));
    }
    Ok(Json(serde_json::json!({ "deleted": tag_id })))
}
