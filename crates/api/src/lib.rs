use anyhow::Context;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{HistogramVec, IntCounterVec, IntGauge};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

mod error;
mod middleware;
mod rate;
mod routes;
mod ws;

pub use error::ApiError;

/// Request bodies are capped at 10 MiB.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Per-IP WebSocket connection cap.
pub const WS_MAX_CONNECTIONS_PER_IP: usize = 10;

/// HTTP-surface metrics plus the gauges refreshed on scrape.
pub struct HttpMetrics {
    pub requests: IntCounterVec,
    pub latency: HistogramVec,
    pub disk_free_bytes: IntGauge,
    pub frame_count: IntGauge,
}

impl HttpMetrics {
    fn register(registry: &prometheus::Registry) -> Result<Self, prometheus::Error> {
        let requests = IntCounterVec::new(
            prometheus::Opts::new("http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )?;
        let latency = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "path"],
        )?;
        let disk_free_bytes = IntGauge::new(
            "disk_free_bytes",
            "Free disk space in bytes for the storage root",
        )?;
        let frame_count =
            IntGauge::new("goes_frames_total", "Total number of GOES frames in the catalog")?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        registry.register(Box::new(disk_free_bytes.clone()))?;
        registry.register(Box::new(frame_count.clone()))?;

        Ok(Self {
            requests,
            latency,
            disk_free_bytes,
            frame_count,
        })
    }
}

pub struct AppConfig {
    pub pool: sqlx::PgPool,
    pub bus: events::EventBus,
    pub client: object_client::ObjectClient,
    pub storage: ingest::StorageLayout,
    pub api_key: Option<String>,
    pub registry: prometheus::Registry,
}

/// Shared state behind every handler.
pub struct App {
    pub pool: sqlx::PgPool,
    pub bus: events::EventBus,
    pub client: object_client::ObjectClient,
    pub storage: ingest::StorageLayout,
    pub api_key: Option<String>,
    pub registry: prometheus::Registry,
    pub metrics: HttpMetrics,
    pub(crate) rate: rate::RateLimiter,
    ws_connections: Mutex<HashMap<IpAddr, usize>>,
}

impl App {
    pub fn new(config: AppConfig) -> anyhow::Result<Arc<Self>> {
        let metrics = HttpMetrics::register(&config.registry)
            .context("failed to register HTTP metrics")?;
        Ok(Arc::new(Self {
            pool: config.pool,
            bus: config.bus,
            client: config.client,
            storage: config.storage,
            api_key: config.api_key,
            registry: config.registry,
            metrics,
            rate: rate::RateLimiter::default(),
            ws_connections: Mutex::new(HashMap::new()),
        }))
    }

    /// Record one rate-limited request; false when the caller is over
    /// budget for this operation.
    pub(crate) fn rate_check(&self, ip: IpAddr, operation: &'static str, limit: u32) -> bool {
        self.rate.check(ip, operation, limit)
    }

    /// Track a WebSocket connection for `ip`. False when over the cap.
    pub(crate) fn ws_connect(&self, ip: IpAddr) -> bool {
        let mut connections = self.ws_connections.lock().unwrap();
        let count = connections.entry(ip).or_insert(0);
        if *count >= WS_MAX_CONNECTIONS_PER_IP {
            return false;
        }
        *count += 1;
        true
    }

    pub(crate) fn ws_disconnect(&self, ip: IpAddr) {
        let mut connections = self.ws_connections.lock().unwrap();
        if let Some(count) = connections.get_mut(&ip) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                connections.remove(&ip);
            }
        }
    }
}

/// Request wraps a JSON-deserialized request type T which also implements
/// the validator::Validate trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct Request<T>(pub T);

/// Rejection is an error type of reasons why an API request may fail before
/// reaching its handler.
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    JsonError(#[from] axum::extract::rejection::JsonRejection),
}

impl<T, S> axum::extract::FromRequest<S> for Request<T>
where
    T: serde::de::DeserializeOwned + validator::Validate,
    S: Send + Sync,
    axum::extract::Json<T>:
        axum::extract::FromRequest<S, Rejection = axum::extract::rejection::JsonRejection>,
{
    type Rejection = Rejection;

    async fn from_request(
        req: axum::extract::Request,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let axum::extract::Json(value) = axum::extract::Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Request(value))
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> axum::response::Response {
        let detail = match &self {
            Rejection::ValidationError(inner) => {
                format!("Input validation error: [{inner}]").replace('\n', ", ")
            }
            Rejection::JsonError(inner) => inner.body_text(),
        };
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(serde_json::json!({
                "error": "validation_error",
                "detail": detail,
            })),
        )
            .into_response()
    }
}

/// Build the agent's API router.
pub fn build_router(app: Arc<App>, allow_origin: &[String]) -> anyhow::Result<axum::Router<()>> {
    let allow_origin = allow_origin
        .iter()
        .map(|o| o.parse())
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse allowed origins")?;

    let allow_headers = ["Content-Type", "Authorization", "X-API-Key", "X-Request-ID"]
        .into_iter()
        .map(|h| h.parse::<axum::http::HeaderName>().unwrap())
        .collect::<Vec<_>>();

    let cors = tower_http::cors::CorsLayer::new()
        .allow_methods(tower_http::cors::AllowMethods::mirror_request())
        .allow_origin(tower_http::cors::AllowOrigin::list(allow_origin))
        .allow_headers(allow_headers)
        .expose_headers([axum::http::HeaderName::from_static(
            middleware::REQUEST_ID_HEADER,
        )]);

    let router = axum::Router::new()
        .merge(routes::goes::router())
        .merge(routes::frames::router())
        .merge(routes::collections::router())
        .merge(routes::tags::router())
        .merge(routes::presets::router())
        .merge(routes::schedules::router())
        .merge(routes::animations::router())
        .merge(routes::jobs::router())
        .merge(routes::health::router())
        .merge(routes::notifications::router())
        .merge(routes::settings::router())
        .merge(routes::shared::router())
        .merge(ws::router())
        .layer(axum::middleware::from_fn_with_state(
            app.clone(),
            middleware::http_metrics,
        ))
        .layer(axum::middleware::from_fn_with_state(
            app.clone(),
            middleware::auth,
        ))
        .layer(axum::middleware::map_response(
            middleware::body_limit_rejection,
        ))
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_id))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .on_failure(tower_http::trace::DefaultOnFailure::new().level(tracing::Level::INFO)),
        )
        .layer(cors)
        .with_state(app);

    Ok(router)
}
