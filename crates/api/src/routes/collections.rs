use crate::{ApiError, App, Request};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use models::{CollectionCreate, CollectionFramesRequest, CollectionUpdate, Id};
use std::sync::Arc;

pub fn router() -> Router<Arc<App>> {
    Router::new()
        .route("/api/goes/collections", get(list).post(create))
        .route(
            "/api/goes/collections/{collection_id}",
            axum::routing::put(update).delete(delete_one),
        )
        .route(
            "/api/goes/collections/{collection_id}/frames",
            post(add_frames).delete(remove_frames),
        )
}

async fn create(
    State(app): State<Arc<App>>,
    Request(payload): Request<CollectionCreate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let collection =
        catalog::collections::create(&app.pool, &payload.name, &payload.description).await?;
    Ok(Json(serde_json::json!({
        "id": collection.id,
        "name": collection.name,
        "description": collection.description,
        "created_at": collection.created_at,
        "updated_at": collection.updated_at,
        "frame_count": 0,
    })))
}

async fn list(
    State(app): State<Arc<App>>,
) -> Result<Json<Vec<catalog::collections::CollectionWithCount>>, ApiError> {
    Ok(Json(catalog::collections::list(&app.pool).await?))
}

async fn update(
    State(app): State<Arc<App>>,
    Path(collection_id): Path<Id>,
    Request(payload): Request<CollectionUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let collection = catalog::collections::update(
        &app.pool,
        collection_id,
        payload.name.as_deref(),
        payload.description.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Collection"))?;
    let frame_count = catalog::collections::frame_count(&app.pool, collection_id).await?;

    Ok(Json(serde_json::json!({
        "id": collection.id,
        "name": collection.name,
        "description": collection.description,
        "created_at": collection.created_at,
        "updated_at": collection.updated_at,
        "frame_count": frame_count,
    })))
}

async fn delete_one(
    State(app): State<Arc<App>>,
    Path(collection_id): Path<Id>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !catalog::collections::delete(&app.pool, collection_id).await? {
        return Err(ApiError::not_found("Collection"));
    }
    Ok(Json(serde_json::json!({ "deleted": collection_id })))
}

async fn add_frames(
    State(app): State<Arc<App>>,
    Path(collection_id): Path<Id>,
    Request(payload): Request<CollectionFramesRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if catalog::collections::fetch(&app.pool, collection_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Collection"));
    }
    let added =
        catalog::collections::add_frames(&app.pool, collection_id, &payload.frame_ids).await?;
    Ok(Json(serde_json::json!({ "added": added })))
}

async fn remove_frames(
    State(app): State<Arc<App>>,
    Path(collection_id): Path<Id>,
    Request(payload): Request<CollectionFramesRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed =
        catalog::collections::remove_frames(&app.pool, collection_id, &payload.frame_ids).await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}
