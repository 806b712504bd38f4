//! Shared test supplier.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nebula_pool::{DiscardReason, Error, Result, Supplier};
use parking_lot::Mutex;

/// First value handed out by [`Recorder::create`].
pub const FIRST_CREATED: u32 = 100;

/// Supplier that numbers the instances it creates and records every
/// discard it receives.
#[derive(Clone, Default)]
pub struct Recorder {
    state: Arc<State>,
}

#[derive(Default)]
struct State {
    created: AtomicU32,
    failing: AtomicBool,
    discard_delay: Mutex<Option<Duration>>,
    discarded: Mutex<Vec<(u32, DiscardReason)>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create` fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every `discard` sleep for `delay` before recording.
    pub fn set_discard_delay(&self, delay: Duration) {
        *self.state.discard_delay.lock() = Some(delay);
    }

    pub fn created(&self) -> u32 {
        self.state.created.load(Ordering::SeqCst)
    }

    pub fn discarded(&self) -> Vec<(u32, DiscardReason)> {
        self.state.discarded.lock().clone()
    }

    pub fn discarded_with(&self, reason: DiscardReason) -> Vec<u32> {
        self.discarded()
            .into_iter()
            .filter(|(_, r)| *r == reason)
            .map(|(value, _)| value)
            .collect()
    }
}

#[async_trait]
impl Supplier<u32> for Recorder {
    async fn create(&self) -> Result<Option<u32>> {
        if self.state.failing.load(Ordering::SeqCst) {
            return Err(Error::unavailable("supplier switched off"));
        }
        Ok(Some(FIRST_CREATED + self.state.created.fetch_add(1, Ordering::SeqCst)))
    }

    async fn discard(&self, instance: u32, reason: DiscardReason) {
        let delay = *self.state.discard_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state.discarded.lock().push((instance, reason));
    }
}

/// Let spawned discard and replacement tasks run to completion.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
