//! Request pacing and the per-run metadata API budget.
//!
//! [`RateLimiter`] is a token bucket: it starts full, refills continuously
//! and makes callers wait only as long as the next token needs. It replaces
//! fixed sleeps between calls, so a slow response already counts toward the
//! spacing. [`ApiBudget`] caps the number of calls to a rate-limited API for
//! the lifetime of one run.

use std::time::{Duration, Instant};

/// Outcome of a non-blocking acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allow,
    Deny { retry_after: Duration },
}

#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    tokens: f64,
    /// Tokens added per second; zero means unlimited.
    refill_per_sec: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// One call per `interval`, with a burst of `capacity` calls.
    pub fn new(capacity: u32, interval: Duration) -> Self {
        let capacity = f64::from(capacity.max(1));
        let refill_per_sec = if interval.is_zero() {
            0.0
        } else {
            1.0 / interval.as_secs_f64()
        };
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    /// At most one call per `interval`.
    pub fn every(interval: Duration) -> Self {
        Self::new(1, interval)
    }

    fn unlimited(&self) -> bool {
        self.refill_per_sec == 0.0
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    pub fn try_acquire_at(&mut self, now: Instant) -> RateLimitDecision {
        if self.unlimited() {
            return RateLimitDecision::Allow;
        }
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return RateLimitDecision::Allow;
        }
        let missing = 1.0 - self.tokens;
        RateLimitDecision::Deny {
            retry_after: Duration::from_secs_f64(missing / self.refill_per_sec),
        }
    }

    /// Wait until a token is available, then take it.
    pub async fn acquire(&mut self) {
        loop {
            match self.try_acquire_at(Instant::now()) {
                RateLimitDecision::Allow => return,
                RateLimitDecision::Deny { retry_after } => tokio::time::sleep(retry_after).await,
            }
        }
    }
}

/// Ceiling on calls to a rate-limited API within one run.
#[derive(Debug, Clone)]
pub struct ApiBudget {
    limit: u32,
    used: u32,
    exhausted: bool,
}

impl ApiBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            used: 0,
            exhausted: false,
        }
    }

    pub fn remaining_calls(&self) -> u32 {
        if self.exhausted {
            0
        } else {
            self.limit.saturating_sub(self.used)
        }
    }

    pub fn record_call(&mut self) {
        self.used = self.used.saturating_add(1);
    }

    /// The remote side reported its limit reached; stop calling it.
    pub fn exhaust(&mut self) {
        self.exhausted = true;
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_is_immediate_then_spaced() {
        let mut limiter = RateLimiter::every(Duration::from_secs(2));
        let t0 = Instant::now();
        assert_eq!(limiter.try_acquire_at(t0), RateLimitDecision::Allow);

        match limiter.try_acquire_at(t0 + Duration::from_millis(500)) {
            RateLimitDecision::Deny { retry_after } => {
                assert!(retry_after > Duration::from_millis(1400));
                assert!(retry_after <= Duration::from_millis(1500));
            }
            RateLimitDecision::Allow => panic!("second call should wait"),
        }

        assert_eq!(
            limiter.try_acquire_at(t0 + Duration::from_millis(2100)),
            RateLimitDecision::Allow
        );
    }

    #[test]
    fn burst_capacity() {
        let mut limiter = RateLimiter::new(3, Duration::from_secs(60));
        let t0 = Instant::now();
        for _ in 0..3 {
            assert_eq!(limiter.try_acquire_at(t0), RateLimitDecision::Allow);
        }
        assert!(matches!(
            limiter.try_acquire_at(t0),
            RateLimitDecision::Deny { .. }
        ));
    }

    #[test]
    fn zero_interval_never_waits() {
        let mut limiter = RateLimiter::every(Duration::ZERO);
        let t0 = Instant::now();
        for _ in 0..100 {
            assert_eq!(limiter.try_acquire_at(t0), RateLimitDecision::Allow);
        }
    }

    #[test]
    fn budget_counts_down_and_exhausts() {
        let mut budget = ApiBudget::new(2);
        assert_eq!(budget.remaining_calls(), 2);
        budget.record_call();
        assert_eq!(budget.remaining_calls(), 1);
        budget.record_call();
        budget.record_call();
        assert_eq!(budget.remaining_calls(), 0);
        assert_eq!(budget.used(), 3);

        let mut budget = ApiBudget::new(10);
        budget.exhaust();
        assert_eq!(budget.remaining_calls(), 0);
    }
}
