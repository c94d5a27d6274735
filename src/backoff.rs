//! Backoff policies and the sleeper abstraction.
//!
//! Two policies are used by the system:
//!
//! - [`ThrottleBackoff`]: linear, uncapped. The k-th consecutive throttle of a
//!   single call waits k time units.
//! - [`PollBackoff`]: exponential with a cap. Used between sweeps of the
//!   operation tracker; reset to the initial interval on every success.
//!
//! All waiting goes through a [`Sleeper`] so tests can record the requested
//! durations instead of waiting on the clock.

use std::time::Duration;

use async_trait::async_trait;

/// Default length of one backoff time unit.
pub const DEFAULT_TIME_UNIT: Duration = Duration::from_secs(1);

/// Default growth factor of the poll backoff.
pub const DEFAULT_GROWTH_FACTOR: u32 = 2;

/// Default cap of the poll backoff, in time units.
pub const DEFAULT_MAX_INTERVAL_UNITS: u32 = 60;

/// Something that can suspend the current task for a duration.
#[async_trait]
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    /// Suspends for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Linear backoff applied to throttled API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleBackoff {
    /// Length of one time unit.
    unit: Duration,
}

impl Default for ThrottleBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl ThrottleBackoff {
    /// Creates the default policy (one-second unit).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            unit: DEFAULT_TIME_UNIT,
        }
    }

    /// Sets the length of one time unit.
    #[must_use]
    pub const fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    /// Delay before retrying after the `attempt`-th consecutive throttle (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.unit.saturating_mul(attempt)
    }
}

/// Capped exponential backoff applied between convergence sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBackoff {
    /// Length of one time unit.
    unit: Duration,
    /// Multiplier applied after every sleep.
    growth_factor: u32,
    /// Upper bound of the interval, in time units.
    max_interval: u32,
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl PollBackoff {
    /// Interval, in time units, a fresh or reset counter starts at.
    pub const INITIAL_INTERVAL: u32 = 1;

    /// Creates the default policy: 1, 2, 4, ... capped at 60 one-second units.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            unit: DEFAULT_TIME_UNIT,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            max_interval: DEFAULT_MAX_INTERVAL_UNITS,
        }
    }

    /// Sets the length of one time unit.
    #[must_use]
    pub const fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    /// Sets the growth factor. Values below 1 are treated as 1.
    #[must_use]
    pub const fn with_growth_factor(mut self, factor: u32) -> Self {
        self.growth_factor = if factor == 0 { 1 } else { factor };
        self
    }

    /// Sets the maximum interval in time units. Values below 1 are treated as 1.
    #[must_use]
    pub const fn with_max_interval(mut self, max_units: u32) -> Self {
        self.max_interval = if max_units == 0 { 1 } else { max_units };
        self
    }

    /// Starts a fresh counter for one convergence run.
    #[must_use]
    pub const fn counter(&self) -> BackoffCounter {
        BackoffCounter {
            policy: *self,
            current: Self::INITIAL_INTERVAL,
        }
    }
}

/// Mutable interval state owned by a single convergence run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffCounter {
    policy: PollBackoff,
    current: u32,
}

impl BackoffCounter {
    /// Current interval in time units.
    #[must_use]
    pub const fn current_units(&self) -> u32 {
        self.current
    }

    /// Current interval as a duration.
    #[must_use]
    pub fn current(&self) -> Duration {
        self.policy.unit.saturating_mul(self.current)
    }

    /// Grows the interval by the growth factor, capped at the maximum.
    pub fn advance(&mut self) {
        self.current = self
            .current
            .saturating_mul(self.policy.growth_factor)
            .min(self.policy.max_interval);
    }

    /// Returns to the initial interval.
    pub const fn reset(&mut self) {
        self.current = PollBackoff::INITIAL_INTERVAL;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::Sleeper;

    /// Sleeper that records requested durations and returns immediately.
    #[derive(Debug, Default)]
    pub struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub fn new() -> Self {
            Self::default()
        }

        /// Requested durations in whole seconds, in call order.
        pub fn seconds(&self) -> Vec<u64> {
            self.slept
                .lock()
                .unwrap()
                .iter()
                .map(Duration::as_secs)
                .collect()
        }

        pub fn count(&self) -> usize {
            self.slept.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }
}
