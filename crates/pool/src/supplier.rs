//! The supplier boundary: how the pool creates and disposes of instances.
//!
//! The pool never inspects `T`. It asks a [`Supplier`] for new instances
//! when it must replace an expired pinned entry, and hands every instance
//! it gives up back to the supplier together with a [`DiscardReason`].

use std::fmt;

use async_trait::async_trait;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Why an instance left the pool for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DiscardReason {
    /// A push found no capacity left.
    Full,
    /// The instance sat unused for longer than the idle timeout.
    Idle,
    /// The instance outlived the maximum age.
    Aged,
    /// The instance predates the last flush.
    Flushed,
    /// The instance was reclaimed while free and unpinned.
    Collected,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Full => "full",
            Self::Idle => "idle",
            Self::Aged => "aged",
            Self::Flushed => "flushed",
            Self::Collected => "collected",
        };
        f.write_str(s)
    }
}

/// Factory and disposer for pooled instances.
///
/// `create` returning `Ok(None)` or an error both mean "no instance right
/// now". The pool does not retry; backoff belongs to the supplier.
#[async_trait]
pub trait Supplier<T: Send + 'static>: Send + Sync + 'static {
    /// Produce a new instance.
    async fn create(&self) -> Result<Option<T>> {
        Ok(None)
    }

    /// Dispose of an instance the pool has given up.
    async fn discard(&self, instance: T, reason: DiscardReason) {
        let _ = reason;
        drop(instance);
    }
}

/// Supplier that never creates anything and drops discarded instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSupplier;

impl<T: Send + 'static> Supplier<T> for NoSupplier {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_supplier_creates_nothing() {
        let supplier = NoSupplier;
        let created: Option<u32> = Supplier::<u32>::create(&supplier).await.unwrap();
        assert!(created.is_none());
        Supplier::<u32>::discard(&supplier, 7, DiscardReason::Idle).await;
    }

    #[test]
    fn reason_display() {
        assert_eq!(DiscardReason::Full.to_string(), "full");
        assert_eq!(DiscardReason::Collected.to_string(), "collected");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn reason_serializes_snake_case() {
        let json = serde_json::to_string(&DiscardReason::Flushed).unwrap();
        assert_eq!(json, "\"flushed\"");
        let back: DiscardReason = serde_json::from_str("\"collected\"").unwrap();
        assert_eq!(back, DiscardReason::Collected);
    }
}
