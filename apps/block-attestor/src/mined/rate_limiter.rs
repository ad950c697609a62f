use std::{
    num::NonZeroU32,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::time::Instant;

/// Lock-free token bucket
///
/// Holds `burst` tokens and regains one every `interval`. Implemented as a
/// generic cell rate algorithm: the only state is the theoretical arrival
/// time of the next request, in nanoseconds since construction, updated with
/// compare-and-swap. Acquiring never blocks or queues.
#[derive(Debug)]
pub struct RateLimiter {
    origin: Instant,
    interval_nanos: u64,
    capacity_nanos: u64,
    theoretical_arrival: AtomicU64,
}

impl RateLimiter {
    /// Creates a full bucket of `burst` tokens refilling one per `interval`
    pub fn new(interval: Duration, burst: NonZeroU32) -> Self {
        let interval_nanos = u64::try_from(interval.as_nanos())
            .unwrap_or(u64::MAX)
            .max(1);

        Self {
            origin: Instant::now(),
            interval_nanos,
            capacity_nanos: interval_nanos.saturating_mul(u64::from(burst.get())),
            theoretical_arrival: AtomicU64::new(0),
        }
    }

    /// Takes a token if one is available.
    pub fn try_acquire(&self) -> bool {
        let now = u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX);
        let mut current = self.theoretical_arrival.load(Ordering::Acquire);

        loop {
            let next = current.max(now).saturating_add(self.interval_nanos);
            if next - now > self.capacity_nanos {
                return false;
            }

            match self.theoretical_arrival.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}
