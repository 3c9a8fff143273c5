use crate::{ApiError, App};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use models::{Id, Notification};
use std::sync::Arc;

pub fn router() -> Router<Arc<App>> {
    Router::new()
        .route("/api/notifications", get(list))
        .route("/api/notifications/{notification_id}/read", post(mark_read))
}

/// Last 50 notifications, newest first.
async fn list(State(app): State<Arc<App>>) -> Result<Json<Vec<Notification>>, ApiError> {
    Ok(Json(catalog::notifications::list(&app.pool).await?))
}

async fn mark_read(
    State(app): State<Arc<App>>,
    Path(notification_id): Path<Id>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !catalog::notifications::mark_read(&app.pool, notification_id).await? {
        return Err(ApiError::not_found("Notification"));
    }
    Ok(Json(serde_json::json!({ "id": notification_id, "read": true })))
}
