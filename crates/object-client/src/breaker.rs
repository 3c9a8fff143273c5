use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Shared circuit breaker guarding one upstream service.
///
/// closed → open after `failure_threshold` consecutive failures;
/// open → half-open once `recovery_timeout` has elapsed;
/// half-open admits a single probe whose outcome closes or re-opens.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: &'static str,
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            name,
            failure_threshold,
            recovery_timeout,
            inner: Mutex::new(Inner {
                failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock().unwrap();
        self.state_locked(&inner)
    }

    fn state_locked(&self, inner: &Inner) -> CircuitState {
        match inner.opened_at {
            None => CircuitState::Closed,
            Some(opened_at) if opened_at.elapsed() >= self.recovery_timeout => {
                CircuitState::HalfOpen
            }
            Some(_) => CircuitState::Open,
        }
    }

    /// Whether a request may proceed. In half-open, only the first caller
    /// gets through as the probe.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match self.state_locked(&inner) {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    false
                } else {
                    inner.probe_in_flight = true;
                    true
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.opened_at.is_some() {
            tracing::info!(breaker = self.name, "circuit closed after successful probe");
        }
        inner.failures = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        match self.state_locked(&inner) {
            CircuitState::HalfOpen => {
                // Failed probe: back to open with a fresh timer.
                inner.opened_at = Some(Instant::now());
                inner.probe_in_flight = false;
                tracing::warn!(breaker = self.name, "probe failed, circuit re-opened");
            }
            CircuitState::Open => {}
            CircuitState::Closed => {
                inner.failures += 1;
                if inner.failures >= self.failure_threshold {
                    inner.opened_at = Some(Instant::now());
                    inner.probe_in_flight = false;
                    tracing::warn!(
                        breaker = self.name,
                        failures = inner.failures,
                        "failure threshold reached, circuit opened"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn breaker(threshold: u32, timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new("test", threshold, Duration::from_millis(timeout_ms))
    }

    #[test]
    fn starts_closed() {
        let cb = breaker(3, 1000);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
    }

    #[test]
    fn opens_after_threshold() {
        let cb = breaker(3, 60_000);
        for _ in 0..3 {
            assert!(cb.allow_request());
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = breaker(3, 60_000);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        // Two more failures stay under the threshold again.
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_after_recovery_timeout() {
        let cb = breaker(2, 100);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.allow_request());
        // Only one probe is admitted.
        assert!(!cb.allow_request());
    }

    #[test]
    fn probe_outcome_closes_or_reopens() {
        let cb = breaker(1, 50);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(80));

        assert!(cb.allow_request());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(80));
        assert!(cb.allow_request());
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
    }
}
