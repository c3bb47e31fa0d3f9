//! Clock capability — injects wall-clock time and sleeping so control-loop
//! code never calls `chrono::Utc::now()` or `tokio::time::sleep` directly.
//!
//! Redesign flag (spec.md §9 DESIGN NOTES): the source's global `time.time()`
//! / `time.sleep()` calls are replaced here with an injected capability so
//! ramps, lock-ins, and wait loops can be driven deterministically in tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Wall-clock time + sleeping, injected everywhere the engine would
/// otherwise reach for `Utc::now()` / `tokio::time::sleep` directly.
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Suspend the calling task for `dur`. On `SystemClock` this is a real
    /// sleep; on `ManualClock` it advances virtual time instantly.
    async fn sleep(&self, dur: Duration);
}

/// Real clock backed by the OS and the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait::async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, dur: Duration) {
        tokio::time::sleep(dur).await;
    }
}

/// Deterministic clock for tests: `sleep` advances virtual time instantly
/// rather than suspending, so ramps/wait-loops/timeouts run instantaneously
/// while still observing elapsed-time logic correctly.
#[derive(Debug)]
pub struct ManualClock {
    epoch_millis: AtomicI64,
}

impl ManualClock {
    /// Start the manual clock at the given wall-clock instant.
    pub fn new(start: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            epoch_millis: AtomicI64::new(start.timestamp_millis()),
        })
    }

    /// Advance virtual time by `dur` without sleeping.
    pub fn advance(&self, dur: Duration) {
        self.epoch_millis
            .fetch_add(dur.as_millis() as i64, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.epoch_millis.load(Ordering::SeqCst))
            .unwrap_or_else(Utc::now)
    }

    async fn sleep(&self, dur: Duration) {
        self.advance(dur);
        // Yield once so tasks awaiting this sleep still cooperate with the
        // scheduler instead of busy-looping.
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_clock_advances_without_real_delay() {
        let clock = ManualClock::new(Utc::now());
        let t0 = clock.now();
        clock.sleep(Duration::from_secs(3600)).await;
        let t1 = clock.now();
        assert_eq!((t1 - t0).num_seconds(), 3600);
    }
}
