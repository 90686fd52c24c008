//! Fixed window request rate limiting, keyed by caller identity.
//!
//! Every caller gets an independent counter that resets `window` after the
//! first request of the current window. Exceeding `max_requests` within one
//! window rejects the request and reports how long the caller has to wait.

use {
    dashmap::DashMap,
    prometheus::IntCounterVec,
    std::time::Duration,
    thiserror::Error,
    tokio::time::Instant,
};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    #[error("rate limited, retry in {retry_after:?}")]
    RateLimited { retry_after: Duration },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Strategy {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct Window {
    started_at: Instant,
    requests: u32,
}

/// Tracks request counts per caller. Windows only ever advance when the
/// caller shows up again, so idle entries cost one map slot and nothing
/// else.
pub struct RateLimiter {
    strategy: Strategy,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            windows: DashMap::new(),
        }
    }

    /// Records one request for the caller and decides whether it is allowed
    /// within the current window.
    pub fn check(&self, caller: &str) -> Result<(), Error> {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(caller.to_string())
            .or_insert_with(|| Window {
                started_at: now,
                requests: 0,
            });

        let elapsed = now.saturating_duration_since(entry.started_at);
        if elapsed >= self.strategy.window {
            entry.started_at = now;
            entry.requests = 0;
        }

        if entry.requests >= self.strategy.max_requests {
            let retry_after = self.strategy.window - elapsed;
            Metrics::get()
                .requests_rate_limited
                .with_label_values(&[caller])
                .inc();
            tracing::debug!(caller, ?retry_after, "rate limited");
            return Err(Error::RateLimited { retry_after });
        }

        entry.requests += 1;
        Ok(())
    }
}

#[derive(prometheus_metric_storage::MetricStorage)]
struct Metrics {
    /// Number of requests rejected by the rate limiter.
    #[metric(labels("caller"))]
    requests_rate_limited: IntCounterVec,
}

impl Metrics {
    fn get() -> &'static Self {
        Metrics::instance(observe::metrics::get_storage_registry()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(Strategy {
            max_requests,
            window: Duration::from_secs(window_secs),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn allows_up_to_the_limit() {
        let limiter = limiter(3, 60);
        for _ in 0..3 {
            assert!(limiter.check("alice").is_ok());
        }
        assert!(matches!(
            limiter.check("alice"),
            Err(Error::RateLimited { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn callers_are_independent() {
        let limiter = limiter(1, 60);
        assert!(limiter.check("alice").is_ok());
        assert!(limiter.check("alice").is_err());
        assert!(limiter.check("bob").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets() {
        let limiter = limiter(1, 60);
        assert!(limiter.check("alice").is_ok());
        assert!(limiter.check("alice").is_err());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check("alice").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn reports_remaining_wait() {
        let limiter = limiter(1, 60);
        assert!(limiter.check("alice").is_ok());

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(
            limiter.check("alice"),
            Err(Error::RateLimited {
                retry_after: Duration::from_secs(40),
            })
        );
    }
}
