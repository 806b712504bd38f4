//! # Nebula Pool
//!
//! Generic concurrent pool of expensive, reusable instances.
//!
//! - **Leasing**: [`Pool::pop`] leases an entry or grants permission to
//!   create one; [`Pool::push`], [`Pool::push_entry`] and [`Pool::discard`]
//!   end the lease. [`Pool::acquire`] wraps the same protocol in a
//!   [`PoolGuard`].
//! - **Bounds**: at most `max_size` leases (strict) or a soft bound with
//!   overdraft; up to `min_size` free entries are pinned and exempt from
//!   idle expiry.
//! - **Expiry**: entries expire by age, idleness, or a [`Pool::flush`]
//!   epoch bump, found lazily on return or by the periodic sweeper.
//! - **Replacement**: expired pinned entries are replaced asynchronously
//!   through the [`Supplier`] on an [`Executor`].
//!
//! ```no_run
//! use std::time::Duration;
//! use nebula_pool::{Pool, PoolConfig};
//!
//! # async fn run() -> nebula_pool::Result<()> {
//! let pool: Pool<Vec<u8>> = Pool::new(PoolConfig::default())?;
//! match pool.pop(Duration::from_secs(1)).await? {
//!     Some(entry) => {
//!         let _ = entry.get().len();
//!         pool.push_entry(entry);
//!     }
//!     None => {
//!         pool.push(Vec::with_capacity(4096));
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod executor;
pub mod guard;
pub mod pool;
pub mod stats;
pub mod supplier;

pub use error::{Error, Result};
pub use executor::{Executor, TokioExecutor};
pub use guard::PoolGuard;
pub use pool::{Entry, Pool, PoolBuilder, PoolConfig};
pub use stats::PoolStats;
pub use supplier::{DiscardReason, NoSupplier, Supplier};
