// src/engine/limiter.rs

//! Token-bucket admission control for starting merge evaluations.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use super::lock;

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    window_start: Instant,
}

/// Token bucket refilled to full capacity once per window.
///
/// Windows are aligned to the instant the limiter was created, so refills
/// happen at `created + k * interval` regardless of when tokens are taken.
/// The limiter only gates *admission* of queued jobs; submissions never
/// consult it.
#[derive(Debug)]
pub struct AdmissionLimiter {
    capacity: u32,
    interval: Duration,
    bucket: Mutex<Bucket>,
}

impl AdmissionLimiter {
    pub fn new(capacity: u32, interval: Duration) -> Self {
        Self::starting_at(capacity, interval, Instant::now())
    }

    fn starting_at(capacity: u32, interval: Duration, start: Instant) -> Self {
        Self {
            capacity,
            interval,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                window_start: start,
            }),
        }
    }

    /// Take one token if available. Never blocks.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        let mut bucket = lock(&self.bucket);
        self.refill(&mut bucket, now);

        if bucket.tokens == 0 {
            trace!("admission denied: token bucket empty");
            return false;
        }
        bucket.tokens -= 1;
        true
    }

    /// Tokens left in the current window.
    pub fn available(&self) -> u32 {
        let mut bucket = lock(&self.bucket);
        self.refill(&mut bucket, Instant::now());
        bucket.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.window_start);
        if elapsed < self.interval {
            return;
        }

        let windows = elapsed.as_nanos() / self.interval.as_nanos();
        let advance = self.interval.as_nanos() * windows;
        bucket.window_start += Duration::from_nanos(advance as u64);
        bucket.tokens = self.capacity;
        trace!(windows, "token bucket refilled");
    }
}
