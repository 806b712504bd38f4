//! Permit counters gating leases, live instances and pinned instances.
//!
//! The three counters are independent: list membership is guarded by the
//! free list's own lock, permit accounting only by these atomics.

use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Semaphore, TryAcquireError};

use crate::error::{Error, Result};

/// Non-blocking permit counter.
#[derive(Debug)]
pub(crate) struct Counter {
    semaphore: Semaphore,
    /// Permits taken out of circulation by `drain`.
    retired: AtomicUsize,
}

impl Counter {
    pub(crate) fn new(permits: usize) -> Self {
        Self {
            semaphore: Semaphore::new(permits),
            retired: AtomicUsize::new(0),
        }
    }

    pub(crate) fn try_acquire(&self) -> bool {
        match self.semaphore.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    pub(crate) fn release(&self) {
        self.semaphore.add_permits(1);
    }

    /// Take every available permit out of circulation; returns how many
    /// were taken.
    pub(crate) fn drain(&self) -> usize {
        let mut drained = 0;
        while self.try_acquire() {
            drained += 1;
        }
        self.retired.fetch_add(drained, Ordering::AcqRel);
        drained
    }

    pub(crate) fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Permits currently held, out of `total`. Drained permits are not
    /// counted as held.
    pub(crate) fn in_use(&self, total: usize) -> usize {
        total.saturating_sub(self.available() + self.retired.load(Ordering::Acquire))
    }
}

/// Lease permits: a blocking semaphore in strict mode, or an overdraft
/// counter that records over-limit leases without ever blocking.
#[derive(Debug)]
pub(crate) enum LeaseLimit {
    Strict(Semaphore),
    Overdraft(AtomicIsize),
}

impl LeaseLimit {
    pub(crate) fn new(max: usize, strict: bool) -> Self {
        if strict {
            Self::Strict(Semaphore::new(max))
        } else {
            Self::Overdraft(AtomicIsize::new(max as isize))
        }
    }

    pub(crate) fn is_strict(&self) -> bool {
        matches!(self, Self::Strict(_))
    }

    /// Acquire one lease permit, waiting up to `timeout`. A zero timeout
    /// tries exactly once. A failed attempt consumes nothing.
    pub(crate) async fn acquire(&self, timeout: Duration) -> Result<()> {
        let semaphore = match self {
            Self::Overdraft(permits) => {
                permits.fetch_sub(1, Ordering::AcqRel);
                return Ok(());
            }
            Self::Strict(semaphore) => semaphore,
        };

        let timed_out = || Error::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        };

        if timeout.is_zero() {
            return match semaphore.try_acquire() {
                Ok(permit) => {
                    permit.forget();
                    Ok(())
                }
                Err(TryAcquireError::NoPermits) => Err(timed_out()),
                Err(TryAcquireError::Closed) => Err(Error::Closed),
            };
        }

        match tokio::time::timeout(timeout, semaphore.acquire()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                Ok(())
            }
            Ok(Err(_)) => Err(Error::Closed),
            Err(_) => Err(timed_out()),
        }
    }

    pub(crate) fn try_acquire(&self) -> bool {
        match self {
            Self::Strict(semaphore) => match semaphore.try_acquire() {
                Ok(permit) => {
                    permit.forget();
                    true
                }
                Err(_) => false,
            },
            Self::Overdraft(permits) => {
                permits.fetch_sub(1, Ordering::AcqRel);
                true
            }
        }
    }

    pub(crate) fn release(&self) {
        match self {
            Self::Strict(semaphore) => semaphore.add_permits(1),
            Self::Overdraft(permits) => {
                permits.fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    /// Strict mode only: take every free permit and reject future waiters.
    /// Overdraft counters are left alone.
    pub(crate) fn drain_and_close(&self) -> usize {
        let Self::Strict(semaphore) = self else {
            return 0;
        };
        let mut drained = 0;
        while let Ok(permit) = semaphore.try_acquire() {
            permit.forget();
            drained += 1;
        }
        semaphore.close();
        drained
    }

    /// Available permits; negative when overdrafted.
    pub(crate) fn available(&self) -> isize {
        match self {
            Self::Strict(semaphore) => semaphore.available_permits() as isize,
            Self::Overdraft(permits) => permits.load(Ordering::Acquire),
        }
    }
}

/// The three permit counters of a pool.
#[derive(Debug)]
pub(crate) struct Permits {
    /// Outstanding leases (pop successes not yet pushed or discarded).
    pub(crate) lease: LeaseLimit,
    /// Live entries, free or leased.
    pub(crate) capacity: Counter,
    /// Pinned ("minimum") entries.
    pub(crate) pinned: Counter,
}

impl Permits {
    pub(crate) fn new(max: usize, min: usize, strict: bool) -> Self {
        Self {
            lease: LeaseLimit::new(max, strict),
            capacity: Counter::new(max),
            pinned: Counter::new(min),
        }
    }

    /// Give back everything an entry holds while leased.
    pub(crate) fn release_entry(&self, pinned: bool) {
        if pinned {
            self.pinned.release();
        }
        self.capacity.release();
        self.lease.release();
    }
}
