use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Per-operation counters for the object-store client. Registered once at
/// process startup against the shared registry.
#[derive(Debug, Clone)]
pub struct Metrics {
    pub requests: IntCounterVec,
    pub errors: IntCounterVec,
    pub bytes_fetched: IntCounter,
}

impl Metrics {
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let requests = IntCounterVec::new(
            Opts::new("s3_requests_total", "Total object-store operations"),
            &["op"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new("s3_errors_total", "Total object-store operation errors"),
            &["op", "kind"],
        )?;
        let bytes_fetched = IntCounter::new(
            "s3_bytes_fetched_total",
            "Total bytes streamed from the object store",
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(bytes_fetched.clone()))?;

        Ok(Self {
            requests,
            errors,
            bytes_fetched,
        })
    }

    /// Unregistered metrics for tests and tools that don't scrape.
    pub fn unregistered() -> Self {
        Self::register(&Registry::new()).expect("metrics construction cannot fail")
    }
}
