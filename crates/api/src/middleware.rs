use crate::App;
use axum::extract::{MatchedPath, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Instant;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Incoming request ids are echoed when they are 8 hex chars or a short
/// alphanumeric token; anything else is replaced.
pub fn is_valid_request_id(id: &str) -> bool {
    if id.is_empty() || id.len() > 64 {
        return false;
    }
    if id.len() == 8 && id.chars().all(|c| c.is_ascii_hexdigit()) {
        return true;
    }
    id.chars().all(|c| c.is_ascii_alphanumeric())
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Echo or generate X-Request-ID, and attach it to the response.
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let incoming = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| is_valid_request_id(v))
        .map(str::to_string);
    let rid = incoming.unwrap_or_else(new_request_id);

    request.extensions_mut().insert(RequestId(rid.clone()));
    let span = tracing::info_span!("request", request_id = %rid);

    use tracing::Instrument;
    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&rid) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Conservative security headers on every response.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    response
}

/// Paths that skip API-key auth even when a key is configured. WebSocket
/// endpoints authenticate inside their own handshake.
fn auth_exempt(path: &str) -> bool {
    path.starts_with("/api/health")
        || path == "/api/metrics"
        || path.starts_with("/api/shared/")
        || path.starts_with("/ws/")
}

/// Optional shared-secret auth: enforced only when the deployment sets a
/// key.
pub async fn auth(
    State(app): State<Arc<App>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = app.api_key.as_deref() else {
        return next.run(request).await;
    };
    if auth_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let presented = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if presented != expected {
        return crate::error::ApiError::Unauthorized("Invalid or missing API key".to_string())
            .into_response();
    }
    next.run(request).await
}

/// Record request counts and latency against the matched route template so
/// path parameters never explode metric cardinality.
pub async fn http_metrics(
    State(app): State<Arc<App>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    if path == "/api/metrics" || path.starts_with("/api/health") {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let started = Instant::now();
    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    app.metrics
        .requests
        .with_label_values(&[&method, &path, &status])
        .inc();
    app.metrics
        .latency
        .with_label_values(&[&method, &path])
        .observe(started.elapsed().as_secs_f64());
    response
}

/// 413 for oversized request bodies, rendered in the error envelope.
pub async fn body_limit_rejection(response: Response) -> Response {
    if response.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            axum::Json(serde_json::json!({
                "error": "request_too_large",
                "detail": "Request body exceeds the 10MB limit",
            })),
        )
            .into_response();
    }
    response
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request_id_validation() {
        assert!(is_valid_request_id("deadbeef"));
        assert!(is_valid_request_id("Abc123"));
        assert!(is_valid_request_id(&"a".repeat(64)));

        assert!(!is_valid_request_id(""));
        assert!(!is_valid_request_id(&"a".repeat(65)));
        assert!(!is_valid_request_id("has space"));
        assert!(!is_valid_request_id("semi;colon"));
        // Eight chars that are not hex but alphanumeric still pass.
        assert!(is_valid_request_id("zzzzzzzz"));
    }

    #[test]
    fn generated_ids_are_short_hex() {
        let id = new_request_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(is_valid_request_id(&id));
    }

    #[test]
    fn auth_exemptions() {
        assert!(auth_exempt("/api/health"));
        assert!(auth_exempt("/api/health/detailed"));
        assert!(auth_exempt("/api/metrics"));
        assert!(auth_exempt("/api/shared/some-token"));
        assert!(auth_exempt("/ws/jobs/abc"));
        assert!(!auth_exempt("/api/goes/frames"));
        assert!(!auth_exempt("/api/jobs"));
    }
}
