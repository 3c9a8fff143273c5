use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// Fixed-window per-IP rate limiter for the expensive enqueue endpoints.
/// Windows are kept in memory; multiple API instances each enforce their
/// own budget, which is acceptable for an abuse guard.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<(IpAddr, &'static str), (Instant, u32)>>,
}

impl RateLimiter {
    /// Record one request and report whether it is within `limit` per
    /// minute for this (ip, operation) pair.
    pub fn check(&self, ip: IpAddr, operation: &'static str, limit: u32) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();

        // Opportunistic expiry keeps the map from growing unbounded.
        if windows.len() > 4096 {
            windows.retain(|_, (started, _)| now.duration_since(*started) < WINDOW);
        }

        let entry = windows.entry((ip, operation)).or_insert((now, 0));
        if now.duration_since(entry.0) >= WINDOW {
            *entry = (now, 0);
        }
        entry.1 += 1;
        entry.1 <= limit
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn enforces_the_per_minute_budget() {
        let limiter = RateLimiter::default();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        for _ in 0..5 {
            assert!(limiter.check(ip, "fetch", 5));
        }
        assert!(!limiter.check(ip, "fetch", 5));
    }

    #[test]
    fn budgets_are_per_ip_and_per_operation() {
        let limiter = RateLimiter::default();
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check(a, "backfill", 1));
        assert!(!limiter.check(a, "backfill", 1));
        // A different caller and a different operation both have headroom.
        assert!(limiter.check(b, "backfill", 1));
        assert!(limiter.check(a, "fetch", 1));
    }
}
