//! LIFO store of free (not leased) entries.

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::entry::Entry;

/// Free entries, most recently returned first.
///
/// The lock only covers splicing; permits are accounted separately.
pub(crate) struct FreeList<T> {
    entries: Mutex<VecDeque<Entry<T>>>,
}

impl<T> FreeList<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub(crate) fn push_front(&self, entry: Entry<T>) {
        self.entries.lock().push_front(entry);
    }

    pub(crate) fn pop_front(&self) -> Option<Entry<T>> {
        self.entries.lock().pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Number of free entries that count toward the pinned minimum.
    pub(crate) fn pinned(&self) -> usize {
        self.entries.lock().iter().filter(|e| e.pinned).count()
    }

    /// Take the instance out of every free entry matching `pred`, leaving
    /// the emptied entries in place.
    pub(crate) fn take_where<F>(&self, mut pred: F) -> Vec<T>
    where
        F: FnMut(&Entry<T>) -> bool,
    {
        let mut entries = self.entries.lock();
        entries
            .iter_mut()
            .filter(|entry| pred(&**entry))
            .filter_map(|entry| entry.instance.take())
            .collect()
    }
}
