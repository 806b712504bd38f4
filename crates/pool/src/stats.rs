//! Pool statistics.
//!
//! Event counters are monotonic; the instance gauges are derived from the
//! permit counters at snapshot time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::supplier::DiscardReason;

/// Live event counters.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) sweeps: AtomicU64,
    pub(crate) flushes: AtomicU64,
    pub(crate) access_timeouts: AtomicU64,
    pub(crate) replaced: AtomicU64,
    collected: AtomicU64,
    idle_timeouts: AtomicU64,
    aged: AtomicU64,
    flushed: AtomicU64,
    overdrafts: AtomicU64,
}

impl Counters {
    pub(crate) fn record(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discard(&self, reason: DiscardReason) {
        let counter = match reason {
            DiscardReason::Full => &self.overdrafts,
            DiscardReason::Idle => &self.idle_timeouts,
            DiscardReason::Aged => &self.aged,
            DiscardReason::Flushed => &self.flushed,
            DiscardReason::Collected => &self.collected,
        };
        Self::record(counter);
    }

    /// Copy the counters into `stats`.
    pub(crate) fn fill(&self, stats: &mut PoolStats) {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        stats.sweeps = load(&self.sweeps);
        stats.flushes = load(&self.flushes);
        stats.access_timeouts = load(&self.access_timeouts);
        stats.replaced = load(&self.replaced);
        stats.collected = load(&self.collected);
        stats.idle_timeouts = load(&self.idle_timeouts);
        stats.aged = load(&self.aged);
        stats.flushed = load(&self.flushed);
        stats.overdrafts = load(&self.overdrafts);
    }
}

/// Point-in-time snapshot of pool statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolStats {
    /// Sweeper passes run.
    pub sweeps: u64,
    /// Calls to `flush`.
    pub flushes: u64,
    /// `pop` calls that timed out waiting for a lease permit.
    pub access_timeouts: u64,
    /// Replacement tasks run.
    pub replaced: u64,
    /// Instances discarded with [`DiscardReason::Collected`].
    pub collected: u64,
    /// Instances discarded with [`DiscardReason::Idle`].
    pub idle_timeouts: u64,
    /// Instances discarded with [`DiscardReason::Aged`].
    pub aged: u64,
    /// Instances discarded with [`DiscardReason::Flushed`].
    pub flushed: u64,
    /// Instances discarded with [`DiscardReason::Full`].
    pub overdrafts: u64,

    /// Whether leases block at `max_size`.
    pub strict: bool,
    /// Lease permits still available; negative while overdrafted.
    pub available_permits: i64,
    /// Live instances holding a capacity permit (free + leased).
    pub instances_pooled: i64,
    /// Outstanding leases.
    pub instances_active: i64,
    /// Pooled instances not currently leased.
    pub instances_idle: i64,
    /// Leases granted as permission to create an instance not yet pushed.
    pub instances_initializing: i64,
    /// Entries currently pinned.
    pub minimum_instances: i64,
    /// Entries sitting in the free list.
    pub free: usize,
    /// Discard callbacks scheduled but not finished.
    pub pending_discards: usize,

    /// Configured minimum.
    pub min_size: usize,
    /// Configured maximum.
    pub max_size: usize,
    /// Configured idle timeout.
    pub idle_timeout: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discards_land_in_their_counter() {
        let counters = Counters::default();
        counters.record_discard(DiscardReason::Aged);
        counters.record_discard(DiscardReason::Aged);
        counters.record_discard(DiscardReason::Full);
        counters.record_discard(DiscardReason::Collected);
        Counters::record(&counters.sweeps);

        let mut stats = PoolStats::default();
        counters.fill(&mut stats);
        assert_eq!(stats.aged, 2);
        assert_eq!(stats.overdrafts, 1);
        assert_eq!(stats.collected, 1);
        assert_eq!(stats.sweeps, 1);
        assert_eq!(stats.idle_timeouts, 0);
    }
}
