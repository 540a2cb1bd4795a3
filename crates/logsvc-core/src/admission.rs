//! Per-key token bucket admission control.
//!
//! Every key (the request's cluster id) owns a bucket holding up to `burst`
//! tokens that refills at `rate` tokens per second. An admitted request
//! consumes one token; a rejected one learns how long until a token is
//! available.
//!
//! Buckets are created lazily on first use. A bucket that has refilled to
//! capacity behaves exactly like a freshly created one, so such buckets are
//! swept periodically to bound the map.

use logsvc_common::{Error, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, trace};

/// Calls between sweeps of full buckets.
const SWEEP_EVERY: u64 = 1024;

/// Retry delay reported when the bucket can never refill.
const NO_REFILL_RETRY_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last: Instant,
}

#[derive(Debug, Default)]
struct LimiterState {
    buckets: HashMap<String, Bucket>,
    calls_since_sweep: u64,
}

/// Token bucket limiter keyed by string.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    rate: f64,
    burst: f64,
    state: Mutex<LimiterState>,
}

impl TokenBucketLimiter {
    /// Create a limiter. Negative or non-finite parameters are treated as zero.
    pub fn new(rate_per_sec: f64, burst: f64) -> Self {
        let sanitize = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        Self {
            rate: sanitize(rate_per_sec),
            burst: sanitize(burst),
            state: Mutex::new(LimiterState::default()),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn burst(&self) -> f64 {
        self.burst
    }

    /// Try to admit one request for `key` now.
    ///
    /// Returns `(true, 0.0)` when admitted, otherwise `(false, retry_after)`
    /// with the seconds until one token will be available.
    pub fn allow(&self, key: &str) -> (bool, f64) {
        self.allow_at(key, Instant::now())
    }

    /// Like [`allow`](Self::allow) with an explicit clock reading.
    ///
    /// Readings earlier than a bucket's last refill count as zero elapsed time.
    pub fn allow_at(&self, key: &str, now: Instant) -> (bool, f64) {
        let mut state = self.lock();

        state.calls_since_sweep += 1;
        if state.calls_since_sweep >= SWEEP_EVERY {
            state.calls_since_sweep = 0;
            self.sweep(&mut state, now);
        }

        let burst = self.burst;
        let bucket = state.buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: burst,
            last: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
        if now > bucket.last {
            bucket.last = now;
        }

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            trace!(key, tokens = bucket.tokens, "admitted");
            return (true, 0.0);
        }

        let retry_after = if self.rate > 0.0 {
            ((1.0 - bucket.tokens) / self.rate).max(0.0)
        } else {
            NO_REFILL_RETRY_SECS
        };
        debug!(key, retry_after, "rejected");
        (false, retry_after)
    }

    /// Admit one request for `key`, or fail with [`Error::RateLimited`].
    pub fn check(&self, key: &str) -> Result<()> {
        match self.allow(key) {
            (true, _) => Ok(()),
            (false, retry_after_secs) => Err(Error::RateLimited {
                key: key.to_string(),
                retry_after_secs,
            }),
        }
    }

    /// Current token count for `key`, or `None` if it has no bucket.
    ///
    /// This is the count as of the last call for the key; no refill is applied.
    pub fn tokens(&self, key: &str) -> Option<f64> {
        self.lock().buckets.get(key).map(|b| b.tokens)
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.lock().buckets.len()
    }

    /// Drop every bucket that has provably refilled to capacity by `now`.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut state = self.lock();
        self.sweep(&mut state, now)
    }

    fn sweep(&self, state: &mut LimiterState, now: Instant) -> usize {
        if self.rate <= 0.0 {
            return 0;
        }
        let before = state.buckets.len();
        let (rate, burst) = (self.rate, self.burst);
        state.buckets.retain(|_, b| {
            let elapsed = now.saturating_duration_since(b.last).as_secs_f64();
            b.tokens + elapsed * rate < burst
        });
        let removed = before - state.buckets.len();
        if removed > 0 {
            debug!(removed, remaining = state.buckets.len(), "swept idle buckets");
        }
        removed
    }

    // Bucket updates never leave the map half-written, so a poisoned lock is
    // still consistent.
    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
