//! Pool configuration

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for an instance pool
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Maximum number of live instances (free + leased)
    pub max_size: usize,
    /// Number of pinned instances the pool keeps warm
    pub min_size: usize,
    /// `true` blocks leases at `max_size`; `false` lets them overdraft
    pub strict: bool,
    /// Instances older than this are expired by the sweeper
    pub max_age: Option<Duration>,
    /// Unpinned instances unused for longer than this are expired
    pub idle_timeout: Option<Duration>,
    /// Period of the background sweeper
    pub sweep_interval: Duration,
    /// Replace aged instances even if they were not pinned
    pub replace_aged: bool,
    /// Replace flushed instances even if they were not pinned
    pub replace_flushed: bool,
    /// Fraction of `max_age` used to spread the creation time of a batch
    /// of replacements. Negative values back-date replacements.
    pub age_jitter_fraction: f64,
    /// Allow free, unpinned instances to be reclaimed through
    /// [`Pool::reclaim`](super::Pool::reclaim)
    pub reclaim_via_weak_reference: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_size: 0,
            strict: true,
            max_age: None,
            idle_timeout: None,
            sweep_interval: Duration::from_secs(5 * 60),
            replace_aged: false,
            replace_flushed: false,
            age_jitter_fraction: -1.0,
            reclaim_via_weak_reference: true,
        }
    }
}

impl PoolConfig {
    /// Validate pool configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::configuration("max_size must be greater than 0"));
        }
        if self.min_size > self.max_size {
            return Err(Error::configuration(format!(
                "min_size ({}) must not exceed max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if let (Some(max_age), Some(idle_timeout)) = (self.max_age, self.idle_timeout)
            && idle_timeout > max_age
        {
            return Err(Error::configuration(format!(
                "idle_timeout ({idle_timeout:?}) must not exceed max_age ({max_age:?})"
            )));
        }
        if self.sweep_interval.is_zero() {
            return Err(Error::configuration(
                "sweep_interval must be greater than zero",
            ));
        }
        if !self.age_jitter_fraction.is_finite() {
            return Err(Error::configuration("age_jitter_fraction must be finite"));
        }
        Ok(())
    }

    /// Whether the sweeper has any age or idle limit to enforce.
    pub(crate) fn has_timeouts(&self) -> bool {
        self.max_age.is_some_and(|d| !d.is_zero())
            || self.idle_timeout.is_some_and(|d| !d.is_zero())
    }

    /// Creation-time offset for replacement `index` of a batch of `count`,
    /// in seconds. Spreads the batch across `max_age` so it does not expire
    /// all at once.
    pub(crate) fn jitter_offset(&self, index: usize, count: usize) -> f64 {
        let Some(max_age) = self.max_age.filter(|d| !d.is_zero()) else {
            return 0.0;
        };
        if count == 0 {
            return 0.0;
        }
        let max_age = max_age.as_secs_f64();
        let offset = (max_age / count as f64 * index as f64 * self.age_jitter_fraction) % max_age;
        if offset.is_finite() { offset } else { 0.0 }
    }
}
