//! Counting barrier for outstanding discard callbacks.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

/// Counts work that has been scheduled but not finished, and lets a
/// closer wait until the count drops to zero.
#[derive(Debug, Default)]
pub(crate) struct CountingLatch {
    count: AtomicUsize,
    zero: Notify,
}

impl CountingLatch {
    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Register one unit of work. The returned guard counts it down on drop.
    pub(crate) fn count_up(self: &Arc<Self>) -> LatchGuard {
        self.count.fetch_add(1, Ordering::AcqRel);
        LatchGuard {
            latch: Arc::clone(self),
        }
    }

    fn count_down(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.zero.notify_waiters();
        }
    }

    /// Wait up to `timeout` for the count to reach zero.
    pub(crate) async fn wait(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.zero.notified();
                tokio::pin!(notified);
                // Register before checking so a count_down between the
                // check and the await is not missed.
                notified.as_mut().enable();
                if self.count() == 0 {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }
}

/// Outstanding unit of work on a [`CountingLatch`].
#[derive(Debug)]
pub(crate) struct LatchGuard {
    latch: Arc<CountingLatch>,
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.latch.count_down();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_latch_is_open() {
        let latch = Arc::new(CountingLatch::default());
        assert!(latch.wait(Duration::from_millis(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_all_guards() {
        let latch = Arc::new(CountingLatch::default());
        let first = latch.count_up();
        let second = latch.count_up();
        assert_eq!(latch.count(), 2);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            drop(first);
            tokio::time::sleep(Duration::from_millis(10)).await;
            drop(second);
        });

        assert!(latch.wait(Duration::from_secs(1)).await);
        assert_eq!(latch.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_while_work_outstanding() {
        let latch = Arc::new(CountingLatch::default());
        let _guard = latch.count_up();
        assert!(!latch.wait(Duration::from_millis(50)).await);
    }
}
