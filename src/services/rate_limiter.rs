use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Capacity, refill speed and advertised back-off of a limiter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatePolicy {
    pub name: &'static str,
    /// Maximum tokens a bucket holds; also the burst size.
    pub capacity: f64,
    /// Tokens added per second.
    pub refill_per_sec: f64,
    /// Value of the `Retry-After` header on denial.
    pub retry_after_secs: u64,
}

impl RatePolicy {
    /// Normal browsing: one bucket per client shared by every endpoint.
    pub const STANDARD: RatePolicy = RatePolicy {
        name: "standard",
        capacity: 30.0,
        refill_per_sec: 2.0,
        retry_after_secs: 5,
    };

    /// Sensitive, low-frequency operations such as login.
    pub const STRICT: RatePolicy = RatePolicy {
        name: "strict",
        capacity: 3.0,
        refill_per_sec: 0.2,
        retry_after_secs: 10,
    };

    /// How long an empty bucket takes to refill completely.
    pub fn time_to_full(&self) -> Duration {
        Duration::from_secs_f64(self.capacity / self.refill_per_sec)
    }
}

/// A single client's bucket.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A bucket that starts at capacity.
    pub fn full(policy: &RatePolicy, now: Instant) -> Self {
        Self {
            tokens: policy.capacity,
            last_refill: now,
        }
    }

    /// Refills for the time elapsed since the last call, then takes one token
    /// if there is one.
    pub fn try_acquire(&mut self, policy: &RatePolicy, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * policy.refill_per_sec).min(policy.capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }
}

/// Per-identity token-bucket admission control.
///
/// One mutex guards both the lookup-or-create and the refill/consume step,
/// so every admission check in the process is serialized. The critical
/// section is a hash lookup and a few float operations.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<LimiterInner>,
}

struct LimiterInner {
    policy: RatePolicy,
    buckets: Mutex<HashMap<String, TokenBucket>>,
    evict_after: Duration,
}

impl RateLimiter {
    /// Creates a limiter whose idle buckets become sweepable after
    /// `idle_eviction`.
    ///
    /// The threshold is raised to the policy's time-to-full if needed: a
    /// bucket idle that long is back at capacity, which is exactly what a
    /// freshly created one holds, so evicting it changes no decision.
    pub fn new(policy: RatePolicy, idle_eviction: Duration) -> Self {
        Self {
            inner: Arc::new(LimiterInner {
                policy,
                buckets: Mutex::new(HashMap::new()),
                evict_after: idle_eviction.max(policy.time_to_full()),
            }),
        }
    }

    pub fn policy(&self) -> &RatePolicy {
        &self.inner.policy
    }

    /// Admits or denies one request from `identity`. Never blocks on I/O.
    pub fn allow(&self, identity: &str) -> bool {
        self.allow_at(identity, Instant::now())
    }

    pub fn allow_at(&self, identity: &str, now: Instant) -> bool {
        let policy = &self.inner.policy;
        let mut buckets = self.inner.buckets.lock();

        match buckets.get_mut(identity) {
            Some(bucket) => bucket.try_acquire(policy, now),
            None => {
                let mut bucket = TokenBucket::full(policy, now);
                let allowed = bucket.try_acquire(policy, now);
                buckets.insert(identity.to_string(), bucket);
                allowed
            }
        }
    }

    /// Drops buckets that have not been touched for the eviction threshold.
    ///
    /// # Returns
    ///
    /// The number of evicted buckets.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let evict_after = self.inner.evict_after;
        let mut buckets = self.inner.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < evict_after);
        before - buckets.len()
    }

    /// Number of tracked identities.
    pub fn len(&self) -> usize {
        self.inner.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The two limiters shared by the whole router.
#[derive(Clone)]
pub struct RateLimiters {
    pub standard: RateLimiter,
    pub strict: RateLimiter,
}

impl RateLimiters {
    pub fn new(idle_eviction: Duration) -> Self {
        Self {
            standard: RateLimiter::new(RatePolicy::STANDARD, idle_eviction),
            strict: RateLimiter::new(RatePolicy::STRICT, idle_eviction),
        }
    }

    pub fn sweep(&self) -> usize {
        self.standard.sweep() + self.strict.sweep()
    }
}
