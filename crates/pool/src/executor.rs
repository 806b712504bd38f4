//! Executor boundary for replacement and discard callbacks.
//!
//! Nothing on the lease path runs here: `pop`, `push` and `discard` only
//! hand work to the executor, so a slow supplier cannot stall them.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use crate::error::{Error, Result};

/// Default number of callbacks allowed to run at once.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Fire-and-forget runner for pool callbacks.
pub trait Executor: Send + Sync + 'static {
    /// Run `task` to completion off the caller's thread.
    fn execute(&self, task: BoxFuture<'static, ()>);
}

/// Executor that spawns onto a tokio runtime, bounding how many callbacks
/// run concurrently.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
    limit: Arc<Semaphore>,
}

impl TokioExecutor {
    /// Spawn onto the given runtime handle.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            limit: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
        }
    }

    /// Spawn onto the runtime the caller is running in.
    ///
    /// # Errors
    /// Returns [`Error::Runtime`] outside a tokio runtime.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| Error::runtime(format!("no tokio runtime for pool executor: {e}")))
    }

    /// Allow at most `limit` callbacks to run at once (minimum 1).
    #[must_use]
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.limit = Arc::new(Semaphore::new(limit.max(1)));
        self
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, task: BoxFuture<'static, ()>) {
        let limit = Arc::clone(&self.limit);
        drop(self.handle.spawn(async move {
            // The semaphore is never closed; a failed acquire still runs
            // the task rather than dropping it.
            let _permit = limit.acquire_owned().await.ok();
            task.await;
        }));
    }
}
