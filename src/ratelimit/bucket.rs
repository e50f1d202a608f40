//! Lazily refilled token bucket.

use tokio::time::Instant;

/// Per-key admission primitive.
///
/// There is no background timer: the balance is brought up to date on
/// every access from the time elapsed since the last refill. The balance
/// never exceeds `capacity` and never drops below zero.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: u32,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        Self::new_at(capacity, refill_rate, Instant::now())
    }

    /// Create a full bucket whose clock starts at `now`.
    pub fn new_at(capacity: u32, refill_rate: f64, now: Instant) -> Self {
        Self {
            capacity,
            refill_rate,
            tokens: f64::from(capacity),
            last_refill: now,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Current balance as of the last refill.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }

    /// Try to take `n` tokens. Returns `false` and leaves the balance
    /// untouched when there are not enough.
    pub fn try_consume(&mut self, n: u32) -> bool {
        self.try_consume_at(n, Instant::now())
    }

    /// [`try_consume`](Self::try_consume) with an explicit clock reading.
    pub fn try_consume_at(&mut self, n: u32, now: Instant) -> bool {
        self.refill_at(now);
        let n = f64::from(n);
        if self.tokens >= n {
            self.tokens -= n;
            true
        } else {
            false
        }
    }

    /// Balance that a refill at `now` would produce, without applying it.
    pub fn available_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * self.refill_rate).min(f64::from(self.capacity))
    }

    /// Seconds until one token is available, `0.0` if one already is.
    pub fn retry_after(&self) -> f64 {
        if self.tokens >= 1.0 {
            return 0.0;
        }
        (1.0 - self.tokens) / self.refill_rate
    }

    fn refill_at(&mut self, now: Instant) {
        // saturating: a clock reading older than last_refill adds nothing
        self.tokens = self.available_at(now);
        self.last_refill = self.last_refill.max(now);
    }
}
