use std::sync::Mutex;
use std::time::{Duration, Instant};

const EWMA_ALPHA: f64 = 0.2;
const FAILURE_PENALTY_MS: f64 = 5_000.0;

struct HealthState {
    ewma_latency_ms: f64,
    next_retry_at: Option<Instant>,
    consecutive_failures: u32,
}

/// Per-upstream health tracking (part of C6): EWMA latency for the weighted
/// strategy, and a `next-retry-time` backoff gate for failover/load_balance.
pub struct UpstreamHealth {
    state: Mutex<HealthState>,
    backoff: Duration,
}

impl UpstreamHealth {
    pub fn new(backoff: Duration) -> Self {
        Self {
            state: Mutex::new(HealthState {
                ewma_latency_ms: 1.0,
                next_retry_at: None,
                consecutive_failures: 0,
            }),
            backoff,
        }
    }

    pub fn is_healthy(&self, now: Instant) -> bool {
        match self.state.lock().unwrap().next_retry_at {
            Some(retry_at) => now >= retry_at,
            None => true,
        }
    }

    pub fn next_retry_at(&self) -> Option<Instant> {
        self.state.lock().unwrap().next_retry_at
    }

    pub fn record_success(&self, latency: Duration) {
        let mut state = self.state.lock().unwrap();
        let sample = latency.as_secs_f64() * 1000.0;
        state.ewma_latency_ms = EWMA_ALPHA * sample + (1.0 - EWMA_ALPHA) * state.ewma_latency_ms;
        state.consecutive_failures = 0;
        state.next_retry_at = None;
    }

    pub fn record_failure(&self, now: Instant) {
        let mut state = self.state.lock().unwrap();
        state.ewma_latency_ms = FAILURE_PENALTY_MS;
        state.consecutive_failures += 1;
        if !self.backoff.is_zero() {
            state.next_retry_at = Some(now + self.backoff);
        }
    }

    /// `1 / max(EWMA_latency_ms, 1 ms)`, used by the weighted strategy.
    pub fn weight(&self) -> f64 {
        let ewma = self.state.lock().unwrap().ewma_latency_ms;
        1.0 / ewma.max(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_marks_unhealthy_until_backoff_elapses() {
        let health = UpstreamHealth::new(Duration::from_secs(30));
        let now = Instant::now();
        assert!(health.is_healthy(now));
        health.record_failure(now);
        assert!(!health.is_healthy(now));
        assert!(health.is_healthy(now + Duration::from_secs(31)));
    }

    #[test]
    fn success_resets_backoff_and_lowers_weight_for_slow_samples() {
        let health = UpstreamHealth::new(Duration::from_secs(30));
        let now = Instant::now();
        health.record_failure(now);
        health.record_success(Duration::from_millis(10));
        assert!(health.is_healthy(now));
        assert!(health.weight() > 0.0);
    }

    #[test]
    fn zero_backoff_disables_unhealthy_marking() {
        let health = UpstreamHealth::new(Duration::ZERO);
        let now = Instant::now();
        health.record_failure(now);
        assert!(health.is_healthy(now));
    }
}
