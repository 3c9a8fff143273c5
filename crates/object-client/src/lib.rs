use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

mod breaker;
mod metrics;

pub use breaker::{CircuitBreaker, CircuitState};
pub use metrics::Metrics;

/// Retry policy for transient upstream errors.
const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY: Duration = Duration::from_secs(1);

/// Per-operation HTTP timeouts.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Download chunks are buffered to at least this size before hitting disk.
const WRITE_BUFFER: usize = 1 << 20;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("circuit breaker {0} is open")]
    CircuitOpen(&'static str),
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("access denied: {bucket}/{key}")]
    AccessDenied { bucket: String, key: String },
    #[error("transient {op} failure: {message}")]
    Transient { op: &'static str, message: String },
    #[error("{op} failed: {message}")]
    Upstream { op: &'static str, message: String },
    #[error("local io error")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient { .. })
    }

    /// Label used on the error counter.
    fn kind(&self) -> &'static str {
        match self {
            Error::CircuitOpen(_) => "circuit_open",
            Error::NotFound { .. } => "not_found",
            Error::AccessDenied { .. } => "access_denied",
            Error::Transient { .. } => "transient",
            Error::Upstream { .. } => "upstream",
            Error::Io(_) => "io",
        }
    }
}

/// Service error codes retried with backoff; everything else from the
/// service surfaces immediately.
const RETRYABLE_CODES: &[&str] = &[
    "Throttling",
    "SlowDown",
    "RequestTimeout",
    "InternalError",
    "ServiceUnavailable",
];

fn classify<E>(op: &'static str, bucket: &str, key: &str, err: SdkError<E>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = format!("{}", DisplayErrorContext(&err));
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            Error::Transient { op, message }
        }
        SdkError::ServiceError(_) => match err.code() {
            Some(code) if RETRYABLE_CODES.contains(&code) => Error::Transient { op, message },
            Some("NoSuchKey") | Some("NoSuchBucket") => Error::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            Some("AccessDenied") => Error::AccessDenied {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => Error::Upstream { op, message },
        },
        _ => Error::Upstream { op, message },
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    BASE_DELAY * 2u32.pow(attempt.saturating_sub(1))
}

/// How the client authenticates. Public NOAA buckets are unsigned; the seam
/// exists so signed buckets can be added without touching call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsMode {
    Unsigned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: i64,
}

/// Read-only client against public, unsigned HTTP object stores, with
/// retry/backoff, a shared circuit breaker, and per-op metrics.
#[derive(Clone)]
pub struct ObjectClient {
    client: aws_sdk_s3::Client,
    breaker: Arc<CircuitBreaker>,
    metrics: Metrics,
}

impl ObjectClient {
    pub async fn connect(
        mode: CredentialsMode,
        breaker: Arc<CircuitBreaker>,
        metrics: Metrics,
    ) -> Self {
        let loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new("us-east-1"))
            .timeout_config(
                aws_config::timeout::TimeoutConfig::builder()
                    .connect_timeout(CONNECT_TIMEOUT)
                    .read_timeout(READ_TIMEOUT)
                    .build(),
            )
            // The SDK's own retries are disabled; this client owns the policy.
            .retry_config(aws_config::retry::RetryConfig::disabled());

        let loader = match mode {
            CredentialsMode::Unsigned => loader.no_credentials(),
        };

        let config = loader.load().await;
        Self {
            client: aws_sdk_s3::Client::new(&config),
            breaker,
            metrics,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn check_breaker(&self, op: &'static str) -> Result<(), Error> {
        if self.breaker.allow_request() {
            Ok(())
        } else {
            self.metrics.errors.with_label_values(&[op, "circuit_open"]).inc();
            Err(Error::CircuitOpen(self.breaker.name()))
        }
    }

    fn record_outcome<T>(&self, op: &'static str, result: &Result<T, Error>) {
        match result {
            Ok(_) => self.breaker.record_success(),
            Err(err) => {
                self.breaker.record_failure();
                self.metrics.errors.with_label_values(&[op, err.kind()]).inc();
            }
        }
    }

    /// Paginated listing of `(key, size)` under a prefix.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>, Error> {
        const OP: &str = "list";

        for attempt in 1..=MAX_ATTEMPTS {
            self.check_breaker(OP)?;
            self.metrics.requests.with_label_values(&[OP]).inc();

            let result = self.list_once(bucket, prefix).await;
            self.record_outcome(OP, &result);

            match result {
                Ok(objects) => return Ok(objects),
                Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        %bucket, %prefix, attempt, ?delay, %err,
                        "transient listing error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
        unreachable!("retry loop always returns");
    }

    async fn list_once(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>, Error> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| classify("list", bucket, prefix, err))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                objects.push(ObjectInfo {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0),
                });
            }
        }
        Ok(objects)
    }

    /// Stream an object body into `dest`, buffered in ≥1 MiB writes. Each
    /// retry restarts the download from scratch into a truncated file.
    #[tracing::instrument(skip(self, dest), level = "debug")]
    pub async fn get_to_file(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, Error> {
        const OP: &str = "get";

        for attempt in 1..=MAX_ATTEMPTS {
            self.check_breaker(OP)?;
            self.metrics.requests.with_label_values(&[OP]).inc();

            let result = self.get_once(bucket, key, dest).await;
            self.record_outcome(OP, &result);

            match result {
                Ok(written) => {
                    self.metrics.bytes_fetched.inc_by(written);
                    return Ok(written);
                }
                Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        %bucket, %key, attempt, ?delay, %err,
                        "transient download error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
        unreachable!("retry loop always returns");
    }

    async fn get_once(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, Error> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| classify("get", bucket, key, err))?;

        let file = tokio::fs::File::create(dest).await?;
        let mut writer = tokio::io::BufWriter::with_capacity(WRITE_BUFFER, file);
        let mut body = output.body;
        let mut written: u64 = 0;

        loop {
            let chunk = body.try_next().await.map_err(|err| Error::Transient {
                op: "get",
                message: err.to_string(),
            })?;
            let Some(chunk) = chunk else { break };
            written += chunk.len() as u64;
            writer.write_all(&chunk).await?;
        }
        writer.flush().await?;
        Ok(written)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn backoff_doubles_from_one_second() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
    }

    #[test]
    fn error_kinds_for_metrics() {
        assert_eq!(Error::CircuitOpen("s3").kind(), "circuit_open");
        assert_eq!(
            Error::Transient {
                op: "get",
                message: String::new()
            }
            .kind(),
            "transient"
        );
        assert!(Error::Transient {
            op: "get",
            message: String::new()
        }
        .is_retryable());
        assert!(!Error::CircuitOpen("s3").is_retryable());
    }
}
