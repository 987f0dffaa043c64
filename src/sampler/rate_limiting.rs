use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::common::{Tag, TraceId};
use crate::sampler::{
    SamplingStatus, SAMPLER_PARAM_TAG_KEY, SAMPLER_TYPE_RATELIMITING, SAMPLER_TYPE_TAG_KEY,
};

/// Token bucket over a monotonic clock.
///
/// Credits accrue at `credits_per_second` up to `capacity`; each admitted
/// decision withdraws one credit. The bucket starts full so a freshly
/// started client can sample a burst immediately.
#[derive(Debug)]
pub(crate) struct TokenBucket {
    credits_per_second: f64,
    capacity: f64,
    balance: f64,
    last: Instant,
}

impl TokenBucket {
    pub(crate) fn new(credits_per_second: f64) -> Self {
        let credits_per_second = if credits_per_second.is_finite() && credits_per_second > 0.0 {
            credits_per_second
        } else {
            if credits_per_second != 0.0 {
                tracing::warn!(
                    requested = credits_per_second,
                    "invalid rate limit; treating as 0"
                );
            }
            0.0
        };
        let capacity = credits_per_second.max(1.0);
        TokenBucket {
            credits_per_second,
            capacity,
            balance: capacity,
            last: Instant::now(),
        }
    }

    pub(crate) fn rate(&self) -> f64 {
        self.credits_per_second
    }

    /// Accrue credits for the elapsed time, then try to withdraw one.
    pub(crate) fn withdraw<F>(&mut self, now: F) -> bool
    where
        F: FnOnce() -> Instant,
    {
        let now = now();
        let elapsed = now.saturating_duration_since(self.last);
        self.last = now;
        self.balance =
            (self.balance + elapsed.as_secs_f64() * self.credits_per_second).min(self.capacity);
        if self.balance >= 1.0 {
            self.balance -= 1.0;
            true
        } else {
            false
        }
    }

    /// Change the refill rate in place, keeping accrued credit up to the
    /// new capacity.
    pub(crate) fn update(&mut self, credits_per_second: f64) {
        let credits_per_second = if credits_per_second.is_finite() {
            credits_per_second.max(0.0)
        } else {
            0.0
        };
        self.credits_per_second = credits_per_second;
        self.capacity = credits_per_second.max(1.0);
        self.balance = self.balance.min(self.capacity);
    }
}

/// Samples up to a fixed number of traces per second.
///
/// All three token-bucket steps run atomically with respect to concurrent
/// callers; the critical section is a handful of float operations.
#[derive(Debug)]
pub struct RateLimitingSampler {
    bucket: Mutex<TokenBucket>,
}

impl RateLimitingSampler {
    /// Create a sampler admitting at most `max_traces_per_second` traces
    /// per second, with a burst capacity of `max(max_traces_per_second, 1)`.
    /// Negative rates are treated as zero.
    pub fn new(max_traces_per_second: f64) -> Self {
        RateLimitingSampler {
            bucket: Mutex::new(TokenBucket::new(max_traces_per_second)),
        }
    }

    /// The current rate in traces per second.
    pub fn rate(&self) -> f64 {
        self.lock_bucket().rate()
    }

    /// Replace the rate in place. Used by remote strategy refreshes.
    pub(crate) fn update(&self, max_traces_per_second: f64) {
        self.lock_bucket().update(max_traces_per_second);
    }

    pub(crate) fn is_sampled(&self, _trace_id: TraceId, _operation_name: &str) -> SamplingStatus {
        let mut bucket = self.lock_bucket();
        let sampled = bucket.withdraw(Instant::now);
        let rate = bucket.rate();
        drop(bucket);
        SamplingStatus::new(
            sampled,
            vec![
                Tag::new(SAMPLER_TYPE_TAG_KEY, SAMPLER_TYPE_RATELIMITING),
                Tag::new(SAMPLER_PARAM_TAG_KEY, rate),
            ],
        )
    }

    fn lock_bucket(&self) -> std::sync::MutexGuard<'_, TokenBucket> {
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fresh_bucket_admits_a_burst_up_to_capacity() {
        let sampler = RateLimitingSampler::new(2.0);
        assert!(sampler.is_sampled(TraceId::default(), "op").is_sampled());
        assert!(sampler.is_sampled(TraceId::default(), "op").is_sampled());
        assert!(!sampler.is_sampled(TraceId::default(), "op").is_sampled());
    }

    #[test]
    fn fractional_rate_still_has_unit_capacity() {
        let sampler = RateLimitingSampler::new(0.1);
        assert!(sampler.is_sampled(TraceId::default(), "op").is_sampled());
        assert!(!sampler.is_sampled(TraceId::default(), "op").is_sampled());
    }

    #[test]
    fn decision_tags_carry_type_and_rate() {
        let sampler = RateLimitingSampler::new(0.1);
        let status = sampler.is_sampled(TraceId::default(), "op");
        assert_eq!(status.tags().len(), 2);
        assert_eq!(status.tags()[0].key(), SAMPLER_TYPE_TAG_KEY);
        assert_eq!(status.tags()[1].key(), SAMPLER_PARAM_TAG_KEY);
        assert_eq!(
            status.tags()[1].value(),
            &crate::common::TagValue::F64(0.1)
        );
    }

    #[test]
    fn credits_accrue_with_elapsed_time() {
        // Capacity 2, one credit every 10 seconds.
        let mut bucket = TokenBucket::new(0.1);
        bucket.capacity = 2.0;
        bucket.balance = 2.0;
        let start = bucket.last;

        let cases = vec![
            (0, vec![true, true, false]),
            (1, vec![false]),
            (5, vec![false]),
            (16, vec![true, false]),
            (76, vec![true, true, false]), // capped at capacity
        ];
        for (elapsed_sec, outcomes) in cases {
            for expected in outcomes {
                assert_eq!(
                    expected,
                    bucket.withdraw(|| start + Duration::from_secs(elapsed_sec)),
                    "at t+{}s",
                    elapsed_sec
                );
            }
        }
    }

    #[test]
    fn admissions_are_bounded_over_a_window() {
        // Property: over T seconds at rate r, admissions <= ceil(r * T) + capacity.
        let mut bucket = TokenBucket::new(2.0);
        let start = bucket.last;
        let mut admitted = 0;
        for i in 0..100u64 {
            if bucket.withdraw(|| start + Duration::from_millis(i * 100)) {
                admitted += 1;
            }
        }
        // T ~ 10s, r = 2/s, capacity 2.
        assert!(admitted <= 22, "admitted {}", admitted);
        assert!(admitted >= 20, "admitted {}", admitted);
    }

    #[test]
    fn update_keeps_accrued_credit_within_new_capacity() {
        let mut bucket = TokenBucket::new(5.0);
        assert_eq!(bucket.rate(), 5.0);
        bucket.update(1.0);
        assert_eq!(bucket.rate(), 1.0);
        // Balance was 5, clamped down to the new capacity of 1.
        let t = bucket.last;
        assert!(bucket.withdraw(|| t));
        assert!(!bucket.withdraw(|| t));
    }

    #[test]
    fn negative_rate_never_samples() {
        let sampler = RateLimitingSampler::new(-3.0);
        assert_eq!(sampler.rate(), 0.0);
        // Unit capacity still grants the initial credit, then nothing accrues.
        assert!(sampler.is_sampled(TraceId::default(), "op").is_sampled());
        assert!(!sampler.is_sampled(TraceId::default(), "op").is_sampled());
        assert!(!sampler.is_sampled(TraceId::default(), "op").is_sampled());
    }
}
