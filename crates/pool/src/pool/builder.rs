//! Fluent construction of a [`Pool`].

use std::sync::Arc;
use std::time::Duration;

use super::{Pool, PoolConfig};
use crate::error::Result;
use crate::executor::{Executor, TokioExecutor};
use crate::supplier::{NoSupplier, Supplier};

/// Builder for [`Pool`]. Every setting is optional.
pub struct PoolBuilder<T: Send + 'static> {
    config: PoolConfig,
    supplier: Option<Arc<dyn Supplier<T>>>,
    executor: Option<Arc<dyn Executor>>,
}

impl<T: Send + 'static> Default for PoolBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> std::fmt::Debug for PoolBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("config", &self.config)
            .field("supplier", &self.supplier.is_some())
            .field("executor", &self.executor.is_some())
            .finish()
    }
}

impl<T: Send + 'static> PoolBuilder<T> {
    /// A builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
            supplier: None,
            executor: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.config.max_size = max_size;
        self
    }

    pub fn min_size(mut self, min_size: usize) -> Self {
        self.config.min_size = min_size;
        self
    }

    /// `false` switches leases to overdraft mode.
    pub fn strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.config.max_age = Some(max_age);
        self
    }

    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.config.idle_timeout = Some(idle_timeout);
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn replace_aged(mut self, replace: bool) -> Self {
        self.config.replace_aged = replace;
        self
    }

    pub fn replace_flushed(mut self, replace: bool) -> Self {
        self.config.replace_flushed = replace;
        self
    }

    pub fn age_jitter_fraction(mut self, fraction: f64) -> Self {
        self.config.age_jitter_fraction = fraction;
        self
    }

    pub fn reclaim_via_weak_reference(mut self, enabled: bool) -> Self {
        self.config.reclaim_via_weak_reference = enabled;
        self
    }

    /// Factory used for replacements and [`Pool::acquire`].
    pub fn supplier<S: Supplier<T>>(mut self, supplier: S) -> Self {
        self.supplier = Some(Arc::new(supplier));
        self
    }

    /// Runner for replacement and discard callbacks. Defaults to a
    /// [`TokioExecutor`] on the runtime `build` is called from.
    pub fn executor<E: Executor>(mut self, executor: E) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    /// Validate the configuration and create the pool.
    ///
    /// # Errors
    /// [`Error::Configuration`](crate::Error::Configuration) for invalid
    /// settings, [`Error::Runtime`](crate::Error::Runtime) when no executor
    /// was given and no tokio runtime is running.
    pub fn build(self) -> Result<Pool<T>> {
        self.config.validate()?;
        let executor = match self.executor {
            Some(executor) => executor,
            None => Arc::new(TokioExecutor::current()?),
        };
        let supplier = self.supplier.unwrap_or_else(|| Arc::new(NoSupplier));
        Pool::from_parts(self.config, supplier, executor)
    }
}
