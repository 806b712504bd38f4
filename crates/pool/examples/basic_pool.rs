//! Basic pool usage
//!
//! A supplier that fakes slow connection setup, a pool with a pinned
//! minimum, and a flush that forces the pinned entry to be replaced.
//!
//! Run with `RUST_LOG=nebula_pool=debug cargo run --example basic_pool`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nebula_pool::{DiscardReason, Pool, Result, Supplier};
use tracing_subscriber::EnvFilter;

/// Pretend connection.
#[derive(Debug)]
struct Connection {
    id: u32,
}

struct Connector {
    next: AtomicU32,
}

#[async_trait]
impl Supplier<Connection> for Connector {
    async fn create(&self) -> Result<Option<Connection>> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        tracing::info!(id, "connection opened");
        Ok(Some(Connection { id }))
    }

    async fn discard(&self, connection: Connection, reason: DiscardReason) {
        tracing::info!(id = connection.id, %reason, "connection closed");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let pool: Pool<Connection> = Pool::builder()
        .max_size(4)
        .min_size(1)
        .idle_timeout(Duration::from_secs(30))
        .sweep_interval(Duration::from_secs(10))
        .supplier(Connector {
            next: AtomicU32::new(1),
        })
        .build()?;
    pool.start()?;

    // Guards push their connection back on drop.
    for round in 0..3 {
        let conn = pool.acquire(Duration::from_secs(1)).await?;
        println!("round {round}: using connection {} (fresh: {})", conn.id, conn.is_fresh());
    }

    // The raw protocol: a `None` pop is permission to create and push.
    match pool.pop(Duration::from_secs(1)).await? {
        Some(entry) => {
            println!("reusing connection {}", entry.get().id);
            pool.push_entry(entry);
        }
        None => {
            pool.push(Connection { id: 0 });
        }
    }

    pool.flush();
    pool.sweep();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let stats = pool.stats();
    println!(
        "pooled={} pinned={} flushed={} replaced={}",
        stats.instances_pooled, stats.minimum_instances, stats.flushed, stats.replaced
    );

    let clean = pool.close(Duration::from_secs(5)).await;
    println!("closed cleanly: {clean}");
    Ok(())
}
