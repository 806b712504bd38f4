//! Periodic reclassification of free entries.
//!
//! A sweep drains the whole free list, expires entries that aged or were
//! flushed, moves pinned status off expired entries onto healthy ones,
//! expires idle entries, then hands discards and replacements to the
//! executor. Leased entries are never touched.

use std::collections::VecDeque;
use std::sync::Weak;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{Entry, Pool, PoolInner, Return};
use crate::stats::Counters;
use crate::supplier::DiscardReason;

/// Periodic sweeper task. Ends when cancelled or when the pool is dropped.
pub(super) async fn run<T: Send + 'static>(
    pool: Weak<PoolInner<T>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(inner) = pool.upgrade() else {
            break;
        };
        Pool { inner }.sweep();
    }
}

/// An entry the sweep has decided to expire.
struct Expired<T> {
    entry: Entry<T>,
    reason: DiscardReason,
    /// Permits already given back; the slot will not be replaced.
    released: bool,
}

impl<T: Send + 'static> Pool<T> {
    /// Run one sweep pass now.
    ///
    /// This is what the periodic sweeper runs. It returns immediately when
    /// no flush happened since the previous pass and no age or idle limit
    /// is configured.
    pub fn sweep(&self) {
        let inner = &self.inner;
        Counters::record(&inner.counters.sweeps);

        let epoch = inner.epoch();
        let is_current = inner.swept_epoch.swap(epoch, Ordering::AcqRel) == epoch;
        if is_current && !inner.config.has_timeouts() {
            return;
        }

        let now = Instant::now();
        let drained = self.drain_free();
        let total = drained.len();

        let mut expired: Vec<Expired<T>> = Vec::with_capacity(total);
        let mut candidates: VecDeque<Entry<T>> = VecDeque::with_capacity(total);

        // Age and epoch. Healthy pinned entries go straight back: they
        // cannot idle out.
        for entry in drained {
            let aged = inner.is_aged(&entry, now);
            let flushed = entry.epoch() != epoch;

            if aged || flushed {
                let reason = if aged {
                    DiscardReason::Aged
                } else {
                    DiscardReason::Flushed
                };
                let mut item = Expired {
                    entry,
                    reason,
                    released: false,
                };
                if !inner.should_replace(item.entry.pinned, aged, flushed) {
                    self.release_expired(&mut item);
                }
                expired.push(item);
            } else if entry.pinned {
                self.return_entry(entry, Return::Sweeper);
            } else {
                candidates.push_back(entry);
            }
        }

        // Move pinned status from expired entries onto surviving ones so
        // the minimum never dips while replacements are pending.
        for item in expired
            .iter_mut()
            .filter(|item| item.entry.pinned && !item.released)
        {
            let Some(mut candidate) = candidates.pop_front() else {
                break;
            };
            candidate.pinned = true;
            self.return_entry(candidate, Return::Sweeper);

            item.entry.pinned = false;
            self.release_expired(item);
        }

        // Idle timeout, for unpinned survivors only.
        for entry in candidates {
            if inner.is_idle(&entry, now) {
                let mut item = Expired {
                    entry,
                    reason: DiscardReason::Idle,
                    released: false,
                };
                self.release_expired(&mut item);
                expired.push(item);
            } else {
                self.return_entry(entry, Return::Sweeper);
            }
        }

        let expired_count = expired.len();
        let mut replacements = Vec::new();
        for mut item in expired {
            if let Some(value) = item.entry.instance.take() {
                self.schedule_discard(value, item.reason);
            }
            if !item.released {
                replacements.push(item.entry);
            }
        }

        let count = replacements.len();
        for (index, entry) in replacements.into_iter().enumerate() {
            let offset = inner.config.jitter_offset(index, count);
            self.schedule_replace(entry, offset);
        }

        tracing::debug!(
            epoch,
            swept = total,
            expired = expired_count,
            replacing = count,
            "pool sweep complete"
        );
    }

    /// Take every free entry out of the list, each holding a lease permit.
    /// Stops when the list is empty or no lease permit is left.
    fn drain_free(&self) -> Vec<Entry<T>> {
        let inner = &self.inner;
        let mut entries = Vec::with_capacity(inner.config.max_size);
        while inner.permits.lease.try_acquire() {
            if let Some(entry) = self.take_free() {
                entries.push(entry);
            } else {
                inner.permits.lease.release();
                break;
            }
        }
        entries
    }

    fn release_expired(&self, item: &mut Expired<T>) {
        if !item.released {
            self.inner.permits.release_entry(item.entry.pinned);
            item.released = true;
        }
    }
}
