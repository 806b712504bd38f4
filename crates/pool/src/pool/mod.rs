//! Concurrent instance pool.
//!
//! Every successful [`Pool::pop`] must be followed by exactly one
//! [`Pool::push`] / [`Pool::push_entry`] or [`Pool::discard`]. A pop that
//! returns `None` is still a success: it grants permission to create an
//! instance and push it. Breaking this contract leaks a lease permit.

mod builder;
pub mod config;
mod entry;
mod free_list;
mod latch;
mod permit;
mod sweeper;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::executor::{Executor, TokioExecutor};
use crate::guard::PoolGuard;
use crate::stats::{Counters, PoolStats};
use crate::supplier::{DiscardReason, NoSupplier, Supplier};

pub use builder::PoolBuilder;
pub use config::PoolConfig;
pub use entry::Entry;

use free_list::FreeList;
use latch::CountingLatch;
use permit::Permits;

/// How long [`Pool::add`] waits for a lease permit.
const ADD_TIMEOUT: Duration = Duration::from_millis(100);

/// Who is handing an entry back to the free list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Return {
    /// A lease holder; refreshes the entry's last-used time.
    Caller,
    /// The sweeper giving back what it drained; leaves last-used alone.
    Sweeper,
}

/// Inner shared state for the pool.
struct PoolInner<T: Send + 'static> {
    config: PoolConfig,
    free: FreeList<T>,
    permits: Permits,
    epoch: AtomicU64,
    /// Epoch observed by the previous sweep.
    swept_epoch: AtomicU64,
    supplier: Arc<dyn Supplier<T>>,
    executor: Arc<dyn Executor>,
    counters: Counters,
    pending_discards: Arc<CountingLatch>,
    sweeper: Mutex<Option<CancellationToken>>,
    closed: AtomicBool,
}

impl<T: Send + 'static> PoolInner<T> {
    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn is_aged(&self, entry: &Entry<T>, now: Instant) -> bool {
        self.config
            .max_age
            .is_some_and(|max| !max.is_zero() && entry.age(now) > max)
    }

    fn is_idle(&self, entry: &Entry<T>, now: Instant) -> bool {
        self.config
            .idle_timeout
            .is_some_and(|limit| !limit.is_zero() && entry.idle(now) > limit)
    }

    /// Whether an expired entry keeps its permits for a same-slot
    /// replacement instead of releasing them. Never once closed.
    fn should_replace(&self, pinned: bool, aged: bool, flushed: bool) -> bool {
        !self.is_closed()
            && (pinned
                || (aged && self.config.replace_aged)
                || (flushed && self.config.replace_flushed))
    }
}

/// Generic pool of expensive, reusable instances.
///
/// Bounds outstanding leases at `max_size`, keeps up to `min_size` entries
/// pinned, expires entries by age, idleness and flush epoch, and replaces
/// expired pinned entries asynchronously through the [`Supplier`].
pub struct Pool<T: Send + 'static> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("epoch", &self.epoch())
            .field("stats", &self.stats())
            .finish()
    }
}

impl<T: Send + 'static> Pool<T> {
    /// Start building a pool.
    pub fn builder() -> PoolBuilder<T> {
        PoolBuilder::new()
    }

    /// Create a pool with no supplier, spawning callbacks on the current
    /// tokio runtime.
    ///
    /// # Errors
    /// Returns error if `config` is invalid or no runtime is running.
    pub fn new(config: PoolConfig) -> Result<Self> {
        Self::from_parts(
            config,
            Arc::new(NoSupplier),
            Arc::new(TokioExecutor::current()?),
        )
    }

    pub(crate) fn from_parts(
        config: PoolConfig,
        supplier: Arc<dyn Supplier<T>>,
        executor: Arc<dyn Executor>,
    ) -> Result<Self> {
        config.validate()?;
        let permits = Permits::new(config.max_size, config.min_size, config.strict);
        Ok(Self {
            inner: Arc::new(PoolInner {
                free: FreeList::with_capacity(config.max_size),
                permits,
                epoch: AtomicU64::new(0),
                swept_epoch: AtomicU64::new(0),
                supplier,
                executor,
                counters: Counters::default(),
                pending_discards: Arc::new(CountingLatch::default()),
                sweeper: Mutex::new(None),
                closed: AtomicBool::new(false),
                config,
            }),
        })
    }

    /// The configuration this pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Current flush epoch.
    pub fn epoch(&self) -> u64 {
        self.inner.epoch()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Lease an entry, waiting up to `timeout` for a lease permit.
    ///
    /// `Ok(Some(entry))` leases a pooled instance. `Ok(None)` grants
    /// permission to create an instance and [`push`](Self::push) it, or to
    /// give the permission back with `discard(None)`. A zero `timeout`
    /// tries once without waiting.
    ///
    /// # Errors
    /// [`Error::Timeout`] if no permit was available in time (nothing is
    /// consumed), [`Error::Closed`] after [`close`](Self::close).
    pub async fn pop(&self, timeout: Duration) -> Result<Option<Entry<T>>> {
        let inner = &self.inner;
        if inner.is_closed() {
            return Err(Error::Closed);
        }

        if let Err(error) = inner.permits.lease.acquire(timeout).await {
            if matches!(error, Error::Timeout { .. }) {
                Counters::record(&inner.counters.access_timeouts);
            }
            return Err(error);
        }

        Ok(self.take_free())
    }

    /// Pop the most recent live entry off the free list, releasing the
    /// capacity permit of any reclaimed entries found on the way.
    fn take_free(&self) -> Option<Entry<T>> {
        loop {
            let entry = self.inner.free.pop_front()?;
            if entry.instance.is_alive() {
                return Some(entry);
            }
            tracing::trace!("skipping reclaimed entry");
            self.inner.permits.capacity.release();
        }
    }

    /// Lease an instance as an RAII guard, creating one through the
    /// supplier when the free list is empty.
    ///
    /// Dropping the guard pushes the instance back.
    ///
    /// # Errors
    /// Same as [`pop`](Self::pop), plus the supplier's error or
    /// [`Error::Unavailable`] when it produced nothing.
    pub async fn acquire(&self, timeout: Duration) -> Result<PoolGuard<T>> {
        if let Some(entry) = self.pop(timeout).await? {
            return Ok(PoolGuard::pooled(self.clone(), entry));
        }

        // Holding creation permission: give it back if the supplier fails
        // or this future is dropped mid-create.
        let permission = Permission {
            pool: self,
            armed: true,
        };
        match self.inner.supplier.create().await {
            Ok(Some(value)) => {
                permission.exercise();
                Ok(PoolGuard::fresh(self.clone(), value))
            }
            Ok(None) => Err(Error::unavailable("supplier produced no instance")),
            Err(error) => Err(error),
        }
    }

    /// Push a newly created instance, exercising the permission granted by
    /// a `pop` that returned `None`.
    ///
    /// Returns `false` if the instance was not kept: the pool was full or
    /// closed (it is discarded with [`DiscardReason::Full`]), or it was
    /// already stale. The lease permit is released either way.
    pub fn push(&self, value: T) -> bool {
        self.push_with_offset(value, 0.0)
    }

    fn push_with_offset(&self, value: T, offset_secs: f64) -> bool {
        let inner = &self.inner;
        if inner.is_closed() || !inner.permits.capacity.try_acquire() {
            tracing::trace!("no capacity for pushed instance");
            self.schedule_discard(value, DiscardReason::Full);
            inner.permits.lease.release();
            return false;
        }

        let entry = Entry::new(value, inner.epoch(), offset_secs);
        self.return_entry(entry, Return::Caller)
    }

    /// Return a leased entry to the pool.
    ///
    /// Returns `false` if the entry had aged or been flushed meanwhile; it
    /// is then discarded or replaced exactly as a sweep would.
    pub fn push_entry(&self, entry: Entry<T>) -> bool {
        self.return_entry(entry, Return::Caller)
    }

    /// Fill the pool without a preceding `pop`.
    ///
    /// Returns `false` when no lease permit or no capacity was available;
    /// the instance is then discarded with [`DiscardReason::Full`].
    pub async fn add(&self, value: T) -> bool {
        if self.is_closed() || self.inner.permits.lease.acquire(ADD_TIMEOUT).await.is_err()
        {
            self.schedule_discard(value, DiscardReason::Full);
            return false;
        }
        self.push(value)
    }

    /// Give up a lease without returning an instance to the pool.
    ///
    /// With `None`, hands back the permission from a `pop` that returned
    /// `None`. With an entry, also releases its capacity (and pinned)
    /// permit and returns the instance to the caller.
    pub fn discard(&self, entry: Option<Entry<T>>) -> Option<T> {
        let permits = &self.inner.permits;
        match entry {
            Some(mut entry) => {
                permits.release_entry(entry.pinned);
                entry.instance.take()
            }
            None => {
                permits.lease.release();
                None
            }
        }
    }

    /// Invalidate every existing entry. O(1): stale entries are found at
    /// their next push or sweep.
    pub fn flush(&self) {
        Counters::record(&self.inner.counters.flushes);
        let epoch = self.inner.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(epoch, "pool flushed");
    }

    /// Reclaim every free, unpinned instance.
    ///
    /// The supplier's `discard` runs with [`DiscardReason::Collected`]; the
    /// emptied entries give their capacity permit back when a later `pop`
    /// or sweep reaches them. A no-op unless
    /// [`reclaim_via_weak_reference`](PoolConfig::reclaim_via_weak_reference)
    /// is enabled. Returns how many instances were reclaimed.
    pub fn reclaim(&self) -> usize {
        if !self.inner.config.reclaim_via_weak_reference {
            return 0;
        }

        let reclaimed = self.inner.free.take_where(|entry| !entry.pinned);
        let count = reclaimed.len();
        for value in reclaimed {
            self.schedule_discard(value, DiscardReason::Collected);
        }
        if count > 0 {
            tracing::debug!(count, "reclaimed free instances");
        }
        count
    }

    /// Hand an entry back to the free list, or expire it if it has aged or
    /// gone stale since it was taken out.
    fn return_entry(&self, mut entry: Entry<T>, from: Return) -> bool {
        let inner = &self.inner;
        if from == Return::Caller {
            entry.mark_used();
        }

        let aged = inner.is_aged(&entry, Instant::now());
        let flushed = entry.epoch() != inner.epoch() || inner.is_closed();

        if !aged && !flushed {
            if !entry.pinned && inner.permits.pinned.try_acquire() {
                entry.pinned = true;
            }
            inner.free.push_front(entry);
            inner.permits.lease.release();
            return true;
        }

        let reason = if aged {
            DiscardReason::Aged
        } else {
            DiscardReason::Flushed
        };
        tracing::trace!(%reason, pinned = entry.pinned, "returned entry expired");

        let value = entry.instance.take();
        if inner.should_replace(entry.pinned, aged, flushed) {
            // Permits stay with the slot until the replacement lands.
            self.schedule_replace(entry, 0.0);
        } else {
            inner.permits.release_entry(entry.pinned);
        }
        if let Some(value) = value {
            self.schedule_discard(value, reason);
        }
        false
    }

    /// Run the supplier's `discard` on the executor, tracked by the
    /// pending-discard latch until it finishes.
    fn schedule_discard(&self, value: T, reason: DiscardReason) {
        let guard = self.inner.pending_discards.count_up();
        let inner = Arc::clone(&self.inner);
        self.inner.executor.execute(Box::pin(async move {
            let _guard = guard;
            inner.counters.record_discard(reason);
            inner.supplier.discard(value, reason).await;
        }));
    }

    /// Replace an expired slot on the executor. `expired` still holds the
    /// slot's lease, capacity and (if pinned) pinned permits.
    fn schedule_replace(&self, expired: Entry<T>, offset_secs: f64) {
        let pool = self.clone();
        self.inner.executor.execute(Box::pin(async move {
            pool.replace(expired, offset_secs).await;
        }));
    }

    async fn replace(&self, expired: Entry<T>, offset_secs: f64) {
        let inner = &self.inner;
        // Gives the slot's permits back unless a new entry takes them over,
        // including when `create` panics or this task is dropped.
        let slot = Slot {
            pool: self,
            pinned: expired.pinned,
            armed: true,
        };
        drop(expired);

        if !self.is_running() {
            tracing::trace!("pool not running, dropping expired slot");
            return;
        }

        match inner.supplier.create().await {
            Ok(Some(value)) => {
                let mut entry = Entry::new(value, inner.epoch(), offset_secs);
                entry.pinned = slot.pinned;
                slot.fill();
                self.return_entry(entry, Return::Caller);
            }
            Ok(None) => {
                tracing::debug!(pinned = slot.pinned, "supplier produced no replacement");
            }
            Err(error) => {
                tracing::warn!(%error, pinned = slot.pinned, "replacement creation failed");
            }
        }
        Counters::record(&inner.counters.replaced);
    }

    /// Start the periodic sweeper on the current tokio runtime. The first
    /// sweep runs immediately. Calling `start` on a running pool is a no-op.
    ///
    /// # Errors
    /// Returns [`Error::Runtime`] outside a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::runtime(format!("no tokio runtime for pool sweeper: {e}")))?;

        let mut slot = self.inner.sweeper.lock();
        if slot.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return Ok(());
        }

        let cancel = CancellationToken::new();
        drop(handle.spawn(sweeper::run(
            Arc::downgrade(&self.inner),
            self.inner.config.sweep_interval,
            cancel.clone(),
        )));
        *slot = Some(cancel);
        tracing::debug!(interval = ?self.inner.config.sweep_interval, "pool sweeper started");
        Ok(())
    }

    /// Stop the periodic sweeper.
    pub fn stop(&self) {
        if let Some(cancel) = self.inner.sweeper.lock().take() {
            cancel.cancel();
            tracing::debug!("pool sweeper stopped");
        }
    }

    /// Whether the periodic sweeper is running.
    pub fn is_running(&self) -> bool {
        self.inner
            .sweeper
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Shut the pool down.
    ///
    /// Stops accepting new entries, stops the sweeper, flushes and sweeps
    /// once so every free entry is discarded, drains lease permits in strict
    /// mode, then waits up to `timeout` for outstanding discard callbacks.
    /// Returns `true` if they all finished in time.
    pub async fn close(&self, timeout: Duration) -> bool {
        let inner = &self.inner;
        inner.closed.store(true, Ordering::Release);

        let capacity = inner.permits.capacity.drain();
        let pinned = inner.permits.pinned.drain();

        self.stop();

        self.flush();
        self.sweep();

        let leases = inner.permits.lease.drain_and_close();

        // The sweep released permits of the entries it discarded.
        inner.permits.capacity.drain();
        inner.permits.pinned.drain();

        tracing::info!(
            capacity,
            pinned,
            leases,
            pending = inner.pending_discards.count(),
            "pool closing"
        );

        inner.pending_discards.wait(timeout).await
    }

    /// Snapshot of pool statistics.
    pub fn stats(&self) -> PoolStats {
        let inner = &self.inner;
        let max = inner.config.max_size as i64;

        let available_permits = inner.permits.lease.available() as i64;
        let instances_pooled = inner.permits.capacity.in_use(inner.config.max_size) as i64;
        let instances_active = max - available_permits;

        let mut stats = PoolStats {
            strict: inner.permits.lease.is_strict(),
            available_permits,
            instances_pooled,
            instances_active,
            instances_idle: (instances_pooled - instances_active).max(0),
            instances_initializing: (instances_active - instances_pooled).max(0),
            minimum_instances: inner.permits.pinned.in_use(inner.config.min_size) as i64,
            free: inner.free.len(),
            pending_discards: inner.pending_discards.count(),
            min_size: inner.config.min_size,
            max_size: inner.config.max_size,
            idle_timeout: inner.config.idle_timeout,
            ..PoolStats::default()
        };
        inner.counters.fill(&mut stats);
        stats
    }

    /// Number of free entries currently pinned.
    pub fn pinned_free(&self) -> usize {
        self.inner.free.pinned()
    }
}

/// Creation permission held by [`Pool::acquire`] while the supplier runs.
/// Gives the lease permit back on drop unless exercised.
struct Permission<'a, T: Send + 'static> {
    pool: &'a Pool<T>,
    armed: bool,
}

impl<T: Send + 'static> Permission<'_, T> {
    fn exercise(mut self) {
        self.armed = false;
    }
}

impl<T: Send + 'static> Drop for Permission<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.discard(None);
        }
    }
}

/// Permits of an expired slot awaiting its replacement. Released on drop
/// unless filled.
struct Slot<'a, T: Send + 'static> {
    pool: &'a Pool<T>,
    pinned: bool,
    armed: bool,
}

impl<T: Send + 'static> Slot<'_, T> {
    fn fill(mut self) {
        self.armed = false;
    }
}

impl<T: Send + 'static> Drop for Slot<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.inner.permits.release_entry(self.pinned);
        }
    }
}
