//! Time sources for the accumulator
//!
//! Every timestamp the [`Accumulator`](crate::Accumulator) records comes from a
//! [`Clock`]. Production code uses [`RealClock`]; tests substitute
//! [`ManualClock`] to step time deterministically.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::time::{Duration, Instant};

/// The `Clock` used by every accumulator
pub trait Clock {
    /// The current instant according to this clock.
    ///
    /// Successive calls must never go backward.
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
/// A clock that operates with respect to real-clock time.
///
/// Time is read through [`tokio::time::Instant`] so that a paused tokio
/// runtime, see [`tokio::time::pause`], pauses this clock as well.
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone)]
/// A clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test may hand one clone to
/// an [`Accumulator`](crate::Accumulator) and advance another.
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl ManualClock {
    /// Create a new `ManualClock` frozen at `start`.
    #[must_use]
    pub fn new(start: Instant) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move this clock, and every clone of it, forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += duration;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C> Clock for Arc<C>
where
    C: Clock + ?Sized,
{
    fn now(&self) -> Instant {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock, RealClock};
    use tokio::time::{self, Duration, Instant};

    #[test]
    fn manual_clock_clones_share_time() {
        let start = Instant::now();
        let clock = ManualClock::new(start);
        let handle = clock.clone();

        handle.advance(Duration::from_secs(5));
        assert_eq!(clock.now(), start + Duration::from_secs(5));
        assert_eq!(handle.now(), clock.now());
    }

    #[test]
    fn manual_clock_is_frozen_between_advances() {
        let clock = ManualClock::default();
        let first = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert_eq!(first, clock.now());
    }

    #[tokio::test(start_paused = true)]
    async fn real_clock_follows_paused_runtime() {
        let clock = RealClock;
        let before = clock.now();
        time::advance(Duration::from_secs(30)).await;
        assert_eq!(clock.now() - before, Duration::from_secs(30));
    }
}
