//! RAII lease guard

use crate::pool::{Entry, Pool};

/// Lease returned by [`Pool::acquire`].
///
/// Dropping the guard pushes the instance back into the pool. Use
/// [`discard`](Self::discard) to drop it from the pool instead.
pub struct PoolGuard<T: Send + 'static> {
    pool: Pool<T>,
    held: Option<Held<T>>,
}

enum Held<T> {
    /// Leased out of the free list.
    Pooled(Entry<T>),
    /// Created by the supplier under a creation permission.
    Fresh(T),
}

impl<T: Send + 'static> PoolGuard<T> {
    pub(crate) fn pooled(pool: Pool<T>, entry: Entry<T>) -> Self {
        Self {
            pool,
            held: Some(Held::Pooled(entry)),
        }
    }

    pub(crate) fn fresh(pool: Pool<T>, value: T) -> Self {
        Self {
            pool,
            held: Some(Held::Fresh(value)),
        }
    }

    /// Whether the instance was just created rather than reused.
    pub fn is_fresh(&self) -> bool {
        matches!(self.held, Some(Held::Fresh(_)))
    }

    /// The pooled entry, if the instance came from the free list.
    pub fn entry(&self) -> Option<&Entry<T>> {
        match &self.held {
            Some(Held::Pooled(entry)) => Some(entry),
            _ => None,
        }
    }

    /// Give up the lease without returning the instance, releasing every
    /// permit it held. The supplier's `discard` is not called.
    #[must_use]
    pub fn discard(mut self) -> Option<T> {
        match self.held.take()? {
            Held::Pooled(entry) => self.pool.discard(Some(entry)),
            Held::Fresh(value) => {
                self.pool.discard(None);
                Some(value)
            }
        }
    }
}

impl<T: Send + 'static> std::ops::Deref for PoolGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.held.as_ref().expect("guard used after discard") {
            Held::Pooled(entry) => entry.get(),
            Held::Fresh(value) => value,
        }
    }
}

impl<T: Send + 'static> std::ops::DerefMut for PoolGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        match self.held.as_mut().expect("guard used after discard") {
            Held::Pooled(entry) => entry.get_mut(),
            Held::Fresh(value) => value,
        }
    }
}

impl<T: Send + 'static> Drop for PoolGuard<T> {
    fn drop(&mut self) {
        match self.held.take() {
            Some(Held::Pooled(entry)) => {
                self.pool.push_entry(entry);
            }
            Some(Held::Fresh(value)) => {
                self.pool.push(value);
            }
            None => {}
        }
    }
}

impl<T: Send + std::fmt::Debug + 'static> std::fmt::Debug for PoolGuard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("PoolGuard");
        match &self.held {
            Some(Held::Pooled(entry)) => debug.field("pooled", entry),
            Some(Held::Fresh(value)) => debug.field("fresh", value),
            None => debug.field("discarded", &true),
        };
        debug.finish()
    }
}
