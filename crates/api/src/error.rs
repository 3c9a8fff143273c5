use axum::http::StatusCode;
use axum::response::IntoResponse;

/// ApiError is the fundamental error type returned by the API. Every
/// variant renders the `{"error": kind, "detail": text}` envelope with its
/// status code.
#[derive(Debug)]
pub enum ApiError {
    /// 422: malformed input; the caller must fix and retry.
    Validation(String),
    /// 400: the request is well-formed but cannot be honored.
    BadRequest(String),
    /// 401: missing or wrong API key.
    Unauthorized(String),
    /// 403: path traversal or auth outside scope.
    Forbidden(String),
    /// 404: referenced entity does not exist.
    NotFound(String),
    /// 409: uniqueness violation.
    Conflict(String),
    /// 410: the resource existed but has expired.
    Gone(String),
    /// 429: the caller should back off.
    RateLimited(String),
    /// 500: full chain goes to the structured log, a generic message to
    /// the caller.
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Gone(_) => "gone",
            ApiError::RateLimited(_) => "rate_limited",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Gone(_) => StatusCode::GONE,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(error: sqlx::Error) -> ApiError {
        if catalog::is_unique_violation(&error) {
            return ApiError::Conflict("a resource with that name already exists".to_string());
        }
        if matches!(error, sqlx::Error::RowNotFound) {
            return ApiError::NotFound("not found".to_string());
        }
        tracing::error!(?error, "API responding with database error");
        ApiError::Internal(error.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError::Internal(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let detail = match &self {
            ApiError::Internal(error) => {
                tracing::error!(error = format!("{error:#}"), "internal error");
                "An unexpected error occurred".to_string()
            }
            ApiError::Validation(detail)
            | ApiError::BadRequest(detail)
            | ApiError::Unauthorized(detail)
            | ApiError::Forbidden(detail)
            | ApiError::NotFound(detail)
            | ApiError::Conflict(detail)
            | ApiError::Gone(detail)
            | ApiError::RateLimited(detail) => detail.clone(),
        };
        let body = axum::Json(serde_json::json!({
            "error": self.kind(),
            "detail": detail,
        }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kinds_map_to_status_codes() {
        assert_eq!(
            ApiError::Validation(String::new()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Conflict(String::new()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Forbidden(String::new()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::Gone(String::new()).status(), StatusCode::GONE);
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
