use crate::{ApiError, App};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Instant;

pub fn router() -> Router<Arc<App>> {
    Router::new()
        .route("/api/health", get(basic))
        .route("/api/health/version", get(version))
        .route("/api/health/detailed", get(detailed))
        .route("/api/metrics", get(metrics))
}

/// Basic liveness check.
async fn basic() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "build": std::env::var("BUILD_SHA").unwrap_or_else(|_| "dev".to_string()),
    }))
}

async fn check_database(app: &App) -> serde_json::Value {
    let started = Instant::now();
    match sqlx::query("SELECT 1").execute(&app.pool).await {
        Ok(_) => serde_json::json!({
            "status": "ok",
            "latency_ms": started.elapsed().as_secs_f64() * 1000.0,
        }),
        Err(error) => serde_json::json!({ "status": "error", "error": error.to_string() }),
    }
}

async fn check_redis(app: &App) -> serde_json::Value {
    let started = Instant::now();
    match app.bus.ping().await {
        Ok(()) => serde_json::json!({
            "status": "ok",
            "latency_ms": started.elapsed().as_secs_f64() * 1000.0,
        }),
        Err(error) => serde_json::json!({ "status": "error", "error": error.to_string() }),
    }
}

fn check_disk(app: &App) -> serde_json::Value {
    match app.storage.free_space() {
        Ok(free) => {
            let free_gb = free as f64 / (1u64 << 30) as f64;
            let status = if free_gb < 1.0 { "warning" } else { "ok" };
            serde_json::json!({ "status": status, "free_gb": (free_gb * 10.0).round() / 10.0 })
        }
        Err(error) => serde_json::json!({ "status": "error", "error": error.to_string() }),
    }
}

fn check_storage_dirs(app: &App) -> serde_json::Value {
    for dir in [
        app.storage.uploads(),
        app.storage.output(),
        app.storage.temp(),
        app.storage.thumbnails(),
    ] {
        if !dir.is_dir() {
            return serde_json::json!({
                "status": "error",
                "error": "Directory missing or not writable",
            });
        }
        let probe = dir.join(".health_check_tmp");
        if std::fs::write(&probe, b"ok").is_err() {
            return serde_json::json!({
                "status": "error",
                "error": "Directory missing or not writable",
            });
        }
        let _ = std::fs::remove_file(&probe);
    }
    serde_json::json!({ "status": "ok" })
}

async fn check_worker(app: &App) -> serde_json::Value {
    match catalog::jobs::queue_depth(&app.pool).await {
        Ok((pending, processing)) => serde_json::json!({
            "status": "ok",
            "pending": pending,
            "processing": processing,
        }),
        Err(error) => serde_json::json!({ "status": "error", "error": error.to_string() }),
    }
}

fn derive_overall(checks: &serde_json::Map<String, serde_json::Value>) -> &'static str {
    let statuses: Vec<&str> = checks
        .values()
        .filter_map(|c| c.get("status").and_then(|s| s.as_str()))
        .collect();
    if statuses.iter().any(|s| *s == "error") {
        "unhealthy"
    } else if statuses.iter().any(|s| *s == "warning") {
        "degraded"
    } else {
        "healthy"
    }
}

/// Detailed health check with dependency status.
async fn detailed(State(app): State<Arc<App>>) -> Json<serde_json::Value> {
    let mut checks = serde_json::Map::new();
    checks.insert("database".to_string(), check_database(&app).await);
    checks.insert("redis".to_string(), check_redis(&app).await);
    checks.insert("disk".to_string(), check_disk(&app));
    checks.insert("storage".to_string(), check_storage_dirs(&app));
    checks.insert("worker".to_string(), check_worker(&app).await);

    Json(serde_json::json!({
        "status": derive_overall(&checks),
        "checks": checks,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus exposition. Storage and catalog gauges refresh on each
/// scrape.
async fn metrics(State(app): State<Arc<App>>) -> Result<axum::response::Response, ApiError> {
    use axum::response::IntoResponse;
    use prometheus::Encoder;

    if let Ok(free) = app.storage.free_space() {
        app.metrics.disk_free_bytes.set(free as i64);
    }
    if let Ok(count) = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM goes_frames")
        .fetch_one(&app.pool)
        .await
    {
        app.metrics.frame_count.set(count);
    }

    let mut buffer = Vec::new();
    let encoder = prometheus::TextEncoder::new();
    encoder
        .encode(&app.registry.gather(), &mut buffer)
        .map_err(|err| ApiError::Internal(err.into()))?;

    Ok((
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        buffer,
    )
        .into_response())
}
