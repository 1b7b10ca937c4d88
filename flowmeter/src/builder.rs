//! Accumulator builder
//!
//! This module provides a builder for creating an
//! [`Accumulator`] with hooks, a custom clock or a deserialized [`Config`]
//! in one expression.

use std::sync::Arc;

use tokio::time::Duration;

use crate::{
    Accumulator, Config, Usage,
    accumulator::Hooks,
    clock::{Clock, RealClock},
};

/// Builder for [`Accumulator`]
///
/// Unset values fall back to [`Config::default`] and a [`RealClock`].
#[derive(Debug)]
pub struct AccumulatorBuilder<C = RealClock> {
    initial_total: u64,
    retention: Duration,
    clock: C,
    hooks: Hooks,
}

impl Default for AccumulatorBuilder<RealClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl AccumulatorBuilder<RealClock> {
    /// Create a new accumulator builder
    #[must_use]
    pub fn new() -> Self {
        let config = Config::default();
        Self {
            initial_total: config.initial_total,
            retention: config.retention(),
            clock: RealClock,
            hooks: Hooks::default(),
        }
    }
}

impl<C> AccumulatorBuilder<C>
where
    C: Clock,
{
    /// Take the initial total and retention window from `config`
    #[must_use]
    pub fn config(mut self, config: &Config) -> Self {
        self.initial_total = config.initial_total;
        self.retention = config.retention();
        self
    }

    /// Set the initial total, in sub-units
    #[must_use]
    pub fn initial_total(mut self, initial_total: u64) -> Self {
        self.initial_total = initial_total;
        self
    }

    /// Set the retention window
    #[must_use]
    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Read time from `clock` rather than the real clock
    #[must_use]
    pub fn clock<C2>(self, clock: C2) -> AccumulatorBuilder<C2>
    where
        C2: Clock,
    {
        AccumulatorBuilder {
            initial_total: self.initial_total,
            retention: self.retention,
            clock,
            hooks: self.hooks,
        }
    }

    /// Run `hook` after every update
    #[must_use]
    pub fn on_change<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.change = Some(Arc::new(hook));
        self
    }

    /// Run `hook` after every update that crosses a whole display unit
    #[must_use]
    pub fn on_usage<F>(mut self, hook: F) -> Self
    where
        F: Fn(Usage) + Send + Sync + 'static,
    {
        self.hooks.usage = Some(Arc::new(hook));
        self
    }

    /// Build the accumulator
    #[must_use]
    pub fn build(self) -> Accumulator<C> {
        Accumulator::from_parts(self.initial_total, self.retention, self.clock, self.hooks)
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use std::sync::mpsc;

    use tokio::time::Duration;

    use crate::{Accumulator, Config, ManualClock, config::DEFAULT_RETENTION_SECS};

    #[test]
    fn defaults_follow_config_defaults() {
        let acc = Accumulator::builder().build();
        assert_eq!(acc.total_sub_units(), 0);
        assert_eq!(
            acc.retention(),
            Duration::from_secs(DEFAULT_RETENTION_SECS)
        );
    }

    #[test]
    fn config_then_override() {
        let config = Config {
            initial_total: 7_000,
            retention_secs: 120,
        };
        let acc = Accumulator::builder()
            .config(&config)
            .retention(Duration::from_secs(5))
            .build();
        assert_eq!(acc.total(), 7);
        assert_eq!(acc.retention(), Duration::from_secs(5));
    }

    #[test]
    fn hooks_and_clock_are_installed() {
        let clock = ManualClock::default();
        let (change_tx, change_rx) = mpsc::channel();
        let (usage_tx, usage_rx) = mpsc::channel();

        let acc = Accumulator::builder()
            .initial_total(900)
            .clock(clock.clone())
            .on_change(move || {
                let _ = change_tx.send(());
            })
            .on_usage(move |usage| {
                let _ = usage_tx.send(usage);
            })
            .build();

        clock.advance(Duration::from_secs(6));
        acc.update(100);

        change_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("change hook never ran");
        let usage = usage_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("usage hook never ran");
        assert_eq!(usage.whole_units, 1);
        // 0.1 units in a tenth of a minute.
        let rate = usage.rate_per_minute.expect("rate must be defined");
        assert!((rate - 1.0).abs() < 1e-9, "unexpected rate {rate}");
    }
}
