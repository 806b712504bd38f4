//! Pool entries and the instances they wrap.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Caller-supplied payload with a single-fire discard slot.
///
/// The value can be taken out exactly once, either to hand it to the
/// supplier's `discard` or because it was reclaimed. Afterwards the
/// instance is dead and a second discard attempt is a no-op.
pub(crate) struct Instance<T> {
    value: Option<T>,
}

impl<T> Instance<T> {
    fn new(value: T) -> Self {
        Self { value: Some(value) }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.value.is_some()
    }

    pub(crate) fn take(&mut self) -> Option<T> {
        self.value.take()
    }
}

/// One pooled instance plus the bookkeeping the pool needs to age,
/// idle-time and invalidate it.
///
/// An `Entry` returned by [`Pool::pop`](super::Pool::pop) is leased: it is
/// owned by the caller until it goes back through
/// [`Pool::push_entry`](super::Pool::push_entry) or
/// [`Pool::discard`](super::Pool::discard).
pub struct Entry<T> {
    pub(crate) instance: Instance<T>,
    created: Instant,
    pub(crate) last_used: Instant,
    epoch: u64,
    pub(crate) pinned: bool,
}

impl<T> Entry<T> {
    /// Wrap `value`, stamped with `epoch`. `offset_secs` shifts the creation
    /// time; negative values make the entry look older.
    pub(crate) fn new(value: T, epoch: u64, offset_secs: f64) -> Self {
        let created = shifted(Instant::now(), offset_secs);
        Self {
            instance: Instance::new(value),
            created,
            last_used: created,
            epoch,
            pinned: false,
        }
    }

    /// Borrow the pooled instance.
    pub fn get(&self) -> &T {
        self.instance
            .value
            .as_ref()
            .expect("leased entry always holds its instance")
    }

    /// Mutably borrow the pooled instance.
    pub fn get_mut(&mut self) -> &mut T {
        self.instance
            .value
            .as_mut()
            .expect("leased entry always holds its instance")
    }

    /// Whether this entry counts toward the pool's pinned minimum.
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Creation time, including any jitter offset.
    pub fn created(&self) -> Instant {
        self.created
    }

    /// Last time the entry was returned to the pool.
    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    /// Flush epoch the entry was created in.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created)
    }

    pub(crate) fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used)
    }

    pub(crate) fn mark_used(&mut self) {
        self.last_used = Instant::now();
    }
}

impl<T> fmt::Debug for Entry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let now = Instant::now();
        f.debug_struct("Entry")
            .field("pinned", &self.pinned)
            .field("age", &self.age(now))
            .field("idle", &self.idle(now))
            .field("epoch", &self.epoch)
            .field("alive", &self.instance.is_alive())
            .finish()
    }
}

/// `now` moved by `offset_secs`, or `now` itself if the offset does not
/// fit in a `Duration` or an `Instant`.
fn shifted(now: Instant, offset_secs: f64) -> Instant {
    let Ok(offset) = Duration::try_from_secs_f64(offset_secs.abs()) else {
        return now;
    };
    let moved = if offset_secs >= 0.0 {
        now.checked_add(offset)
    } else {
        now.checked_sub(offset)
    };
    moved.unwrap_or(now)
}
