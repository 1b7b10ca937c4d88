//! The windowed running-total accumulator
//!
//! [`Accumulator`] owns the running total, a newest-first history of
//! `(timestamp, total)` samples and two optional notification hooks. Callers
//! drive it with [`Accumulator::update`]; it never schedules work of its own.
//!
//! # Semantics
//!
//! Every update adds to the total, records a new sample and prunes samples
//! older than the retention window from the far end of the history, always
//! leaving at least two behind so a rate query has both a start and an end.
//! When an update carries the total across one or more whole display units the
//! rate implied since the previous crossing is reported to the usage hook.
//!
//! Two numeric edge cases are resolved explicitly:
//!
//! * A flow query over a zero-length window is rejected with
//!   [`Error::ZeroWindow`].
//! * Two whole-unit crossings at the same instant imply no meaningful rate.
//!   The usage hook receives `rate_per_minute: None` in that case.
//!
//! # Concurrency
//!
//! The total, the history, the last crossing and the hooks live behind a
//! single mutex. The clock is read inside that critical section so concurrent
//! updates can never record samples out of time order. [`Accumulator::total`]
//! reads a lock-free mirror of the total that is written inside the same
//! critical section. Hooks are cloned out under the lock and run detached once
//! it is released; they may call back into the accumulator freely.

use std::{
    fmt,
    sync::{Arc, PoisonError},
};

use metrics::{counter, gauge};
use tokio::time::Duration;
use tracing::{debug, trace, warn};

use crate::{
    Error, UNIT_SCALE,
    builder::AccumulatorBuilder,
    clock::{Clock, RealClock},
    dispatch,
    history::{History, Sample},
    sync::{AtomicU64, Mutex, MutexGuard, Ordering},
};

const SECONDS_PER_MINUTE: f64 = 60.0;

/// Hook invoked, detached, after every update.
pub type ChangeHook = Arc<dyn Fn() + Send + Sync>;
/// Hook invoked, detached, after every update that crosses a whole unit.
pub type UsageHook = Arc<dyn Fn(Usage) + Send + Sync>;

/// Reported to the usage hook when the total crosses a whole display unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Usage {
    /// The total in whole display units after the crossing.
    pub whole_units: u64,
    /// Display units per minute since the previous crossing. `None` when no
    /// time elapsed between the two crossings.
    pub rate_per_minute: Option<f64>,
}

#[derive(Default, Clone)]
pub(crate) struct Hooks {
    pub(crate) change: Option<ChangeHook>,
    pub(crate) usage: Option<UsageHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("change", &self.change.is_some())
            .field("usage", &self.usage.is_some())
            .finish()
    }
}

/// Everything guarded by the accumulator's lock.
#[derive(Debug)]
struct State {
    /// The cumulative total in sub-units.
    total: u64,
    history: History,
    /// The sample recorded at the most recent whole-unit crossing.
    last_whole_unit: Sample,
    hooks: Hooks,
}

/// What an update did, carried out of the critical section so logging,
/// metrics and hook dispatch all happen with the lock released.
struct Outcome {
    before: u64,
    after: u64,
    saturated: bool,
    pruned: usize,
    retained: usize,
    crossed: u64,
    change_hook: Option<ChangeHook>,
    usage: Option<(Usage, Option<UsageHook>)>,
}

/// A windowed running-total accumulator.
///
/// Holds a running total in sub-units alongside a time-ordered history of it,
/// pruned to the retention window but never below two samples once updated.
/// Share it between threads behind an `Arc`; every method takes `&self`.
pub struct Accumulator<C = RealClock> {
    state: Mutex<State>,
    /// Mirror of `State::total`, only ever written under `state`'s lock.
    total: AtomicU64,
    retention: Duration,
    clock: C,
}

impl Accumulator<RealClock> {
    /// Create a new `Accumulator` with a real-time clock.
    ///
    /// `initial_total` is given in sub-units. A zero `retention` is accepted,
    /// the history is then only ever as long as the retention floor allows.
    #[must_use]
    pub fn new(initial_total: u64, retention: Duration) -> Self {
        Self::with_clock(initial_total, retention, RealClock)
    }

    /// Begin building an `Accumulator`.
    #[must_use]
    pub fn builder() -> AccumulatorBuilder<RealClock> {
        AccumulatorBuilder::new()
    }
}

impl<C> Accumulator<C>
where
    C: Clock,
{
    /// Create a new `Accumulator` that reads time from `clock`.
    #[must_use]
    pub fn with_clock(initial_total: u64, retention: Duration, clock: C) -> Self {
        Self::from_parts(initial_total, retention, clock, Hooks::default())
    }

    pub(crate) fn from_parts(
        initial_total: u64,
        retention: Duration,
        clock: C,
        hooks: Hooks,
    ) -> Self {
        let initial = Sample {
            timestamp: clock.now(),
            total: initial_total,
        };
        debug!(
            initial_total,
            retention_secs = retention.as_secs_f64(),
            "accumulator created"
        );
        Self {
            state: Mutex::new(State {
                total: initial_total,
                history: History::new(initial),
                last_whole_unit: initial,
                hooks,
            }),
            total: AtomicU64::new(initial_total),
            retention,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // `update` mutates only after its last fallible step, so a poisoned
        // lock still guards consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that `delta` sub-units have passed through the sensor.
    ///
    /// The total saturates at `u64::MAX` rather than wrapping. Any registered
    /// hooks are dispatched after the internal lock is released and are not
    /// waited on.
    pub fn update(&self, delta: u64) {
        let outcome = {
            let mut state = self.lock();
            let now = self.clock.now();

            let before = state.total;
            let (after, saturated) = match before.checked_add(delta) {
                Some(after) => (after, false),
                None => (u64::MAX, true),
            };
            let sample = Sample {
                timestamp: now,
                total: after,
            };
            // Push first: it asserts ordering in debug builds, and a failure
            // there must leave the total untouched.
            state.history.push(sample);
            state.total = after;
            self.total.store(after, Ordering::Release);
            let pruned = state.history.prune(now, self.retention);

            let crossed = after / UNIT_SCALE - before / UNIT_SCALE;
            let usage = (crossed > 0).then(|| {
                let last = state.last_whole_unit;
                let elapsed = now.saturating_duration_since(last.timestamp);
                state.last_whole_unit = sample;
                Usage {
                    whole_units: after / UNIT_SCALE,
                    rate_per_minute: (!elapsed.is_zero())
                        .then(|| per_minute(after.saturating_sub(last.total), elapsed)),
                }
            });

            Outcome {
                before,
                after,
                saturated,
                pruned,
                retained: state.history.len(),
                crossed,
                change_hook: state.hooks.change.clone(),
                usage: usage.map(|usage| (usage, state.hooks.usage.clone())),
            }
        };

        // Everything below runs with the lock released.
        if outcome.saturated {
            warn!(before = outcome.before, delta, "total saturated at u64::MAX");
        }
        trace!(
            delta,
            total = outcome.after,
            pruned = outcome.pruned,
            retained = outcome.retained,
            "update applied"
        );
        counter!("flowmeter_updates_total").increment(1);
        counter!("flowmeter_sub_units_total").increment(delta);
        gauge!("flowmeter_history_len").set(outcome.retained as f64);

        if let Some(hook) = outcome.change_hook {
            dispatch::detach("flowmeter-change", move || hook());
        }
        if let Some((usage, hook)) = outcome.usage {
            debug!(
                whole_units = usage.whole_units,
                rate_per_minute = ?usage.rate_per_minute,
                "whole unit boundary crossed"
            );
            counter!("flowmeter_whole_unit_crossings_total").increment(outcome.crossed);
            if let Some(hook) = hook {
                dispatch::detach("flowmeter-usage", move || hook(usage));
            }
        }
    }

    /// The running total in whole display units, rounded down.
    ///
    /// This read does not take the accumulator's lock.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total_sub_units() / UNIT_SCALE
    }

    /// The running total in sub-units.
    #[must_use]
    pub fn total_sub_units(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// The average flow rate, in display units per minute, over the trailing
    /// `window`.
    ///
    /// The rate is measured from the oldest retained sample inside the window
    /// to the current total. If no retained sample falls inside the window the
    /// rate is zero, so a window reaching mostly past the retained history
    /// undercounts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZeroWindow`] if `window` is zero.
    pub fn flow(&self, window: Duration) -> Result<f64, Error> {
        if window.is_zero() {
            return Err(Error::ZeroWindow);
        }

        let (start, end) = {
            let state = self.lock();
            let now = self.clock.now();
            let end = state.total;
            let start = match now.checked_sub(window) {
                Some(since) => state.history.oldest_since(since),
                // The window reaches back past the clock's epoch and so covers
                // the entire history.
                None => state.history.iter().next_back(),
            }
            .map_or(end, |sample| sample.total);
            (start, end)
        };

        Ok(per_minute(end.saturating_sub(start), window))
    }

    /// A newest-first copy of the retained history.
    #[must_use]
    pub fn history(&self) -> Vec<Sample> {
        self.lock().history.iter().copied().collect()
    }

    /// The number of samples currently retained.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    /// The sample recorded at the most recent whole-unit crossing, or the
    /// initial sample if no crossing has happened yet.
    #[must_use]
    pub fn last_whole_unit(&self) -> Sample {
        self.lock().last_whole_unit
    }

    /// The configured retention window.
    #[must_use]
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Register `hook` to run after every update, replacing any previous
    /// change hook.
    pub fn set_change_hook<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.lock().hooks.change = Some(Arc::new(hook));
    }

    /// Register `hook` to run after every update that crosses a whole display
    /// unit, replacing any previous usage hook.
    pub fn set_usage_hook<F>(&self, hook: F)
    where
        F: Fn(Usage) + Send + Sync + 'static,
    {
        self.lock().hooks.usage = Some(Arc::new(hook));
    }

    /// Remove both hooks. Invocations already dispatched still run.
    pub fn clear_hooks(&self) {
        self.lock().hooks = Hooks::default();
    }
}

impl<C> fmt::Debug for Accumulator<C>
where
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Accumulator")
            .field("retention", &self.retention)
            .field("hooks", &state.hooks)
            .field("last_whole_unit", &state.last_whole_unit)
            .field("total", &state.total)
            .field("history", &state.history)
            .finish_non_exhaustive()
    }
}

/// Convert `sub_units` passed over `elapsed` into display units per minute.
/// `elapsed` must be non-zero.
fn per_minute(sub_units: u64, elapsed: Duration) -> f64 {
    debug_assert!(!elapsed.is_zero());
    let units = sub_units as f64 / UNIT_SCALE as f64;
    units / (elapsed.as_secs_f64() / SECONDS_PER_MINUTE)
}


#[cfg(all(test, loom))]
mod loom_tests {
    use loom::{sync::Arc, thread};
    use tokio::time::Duration;

    use super::Accumulator;
    use crate::ManualClock;

    #[test]
    fn concurrent_updates_are_not_lost() {
        loom::model(|| {
            let acc = Arc::new(Accumulator::with_clock(
                0,
                Duration::from_secs(60),
                ManualClock::default(),
            ));

            let handles: Vec<_> = [400_u64, 700]
                .into_iter()
                .map(|delta| {
                    let acc = Arc::clone(&acc);
                    thread::spawn(move || acc.update(delta))
                })
                .collect();
            let flow = acc.flow(Duration::from_secs(1));
            for handle in handles {
                handle.join().unwrap();
            }

            assert!(flow.is_ok());
            assert_eq!(acc.total_sub_units(), 1_100);
            assert_eq!(acc.total(), 1);
            assert_eq!(acc.history_len(), 3);
        });
    }
}
