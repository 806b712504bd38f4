//! Sweeper behavior: idle and age expiry, pinned exemption and backfill,
//! the periodic task.

mod common;

use std::time::Duration;

use common::{FIRST_CREATED, Recorder, settle};
use nebula_pool::{DiscardReason, Pool, PoolBuilder};

fn builder(recorder: &Recorder) -> PoolBuilder<u32> {
    Pool::builder()
        .supplier(recorder.clone())
        .sweep_interval(Duration::from_secs(3600))
}

#[tokio::test(start_paused = true)]
async fn idle_entries_expire_but_pinned_survive() {
    let recorder = Recorder::new();
    let pool = builder(&recorder)
        .max_size(3)
        .min_size(1)
        .idle_timeout(Duration::from_secs(10))
        .build()
        .unwrap();
    for value in 1..=3 {
        assert!(pool.add(value).await);
    }

    tokio::time::sleep(Duration::from_secs(11)).await;
    pool.sweep();
    settle().await;

    let mut idle = recorder.discarded_with(DiscardReason::Idle);
    idle.sort_unstable();
    assert_eq!(idle, vec![2, 3]);

    let stats = pool.stats();
    assert_eq!(stats.idle_timeouts, 2);
    assert_eq!(stats.free, 1);
    assert_eq!(stats.instances_pooled, 1);
    assert_eq!(stats.available_permits, 3);
    assert_eq!(pool.pinned_free(), 1);
}

#[tokio::test(start_paused = true)]
async fn recently_used_entries_are_not_idle() {
    let recorder = Recorder::new();
    let pool = builder(&recorder)
        .max_size(2)
        .idle_timeout(Duration::from_secs(10))
        .build()
        .unwrap();
    assert!(pool.add(1).await);

    tokio::time::sleep(Duration::from_secs(8)).await;
    let entry = pool.pop(Duration::ZERO).await.unwrap().unwrap();
    pool.push_entry(entry);
    tokio::time::sleep(Duration::from_secs(8)).await;

    pool.sweep();
    settle().await;
    assert!(recorder.discarded().is_empty());
    assert_eq!(pool.stats().free, 1);
}

#[tokio::test(start_paused = true)]
async fn aged_entries_are_discarded_without_replacement() {
    let recorder = Recorder::new();
    let pool = builder(&recorder)
        .max_size(2)
        .max_age(Duration::from_secs(10))
        .build()
        .unwrap();
    pool.start().unwrap();
    assert!(pool.add(1).await);

    tokio::time::sleep(Duration::from_secs(11)).await;
    pool.sweep();
    settle().await;

    assert_eq!(recorder.discarded(), vec![(1, DiscardReason::Aged)]);
    assert_eq!(recorder.created(), 0);
    let stats = pool.stats();
    assert_eq!(stats.aged, 1);
    assert_eq!(stats.replaced, 0);
    assert_eq!(stats.instances_pooled, 0);
}

#[tokio::test(start_paused = true)]
async fn aged_pinned_entry_is_replaced() {
    let recorder = Recorder::new();
    let pool = builder(&recorder)
        .max_size(2)
        .min_size(1)
        .max_age(Duration::from_secs(10))
        .replace_aged(true)
        .build()
        .unwrap();
    pool.start().unwrap();
    assert!(pool.add(1).await);

    tokio::time::sleep(Duration::from_secs(11)).await;
    pool.sweep();
    settle().await;

    assert_eq!(recorder.discarded(), vec![(1, DiscardReason::Aged)]);
    assert_eq!(recorder.created(), 1);
    let stats = pool.stats();
    assert_eq!(stats.replaced, 1);
    assert_eq!(stats.free, 1);
    assert_eq!(stats.minimum_instances, 1);
    assert_eq!(stats.available_permits, 2);

    let entry = pool.pop(Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(*entry.get(), FIRST_CREATED);
    assert!(entry.is_pinned());
    pool.push_entry(entry);
}

#[tokio::test(start_paused = true)]
async fn pinned_status_moves_to_a_survivor() {
    let recorder = Recorder::new();
    let pool = builder(&recorder)
        .max_size(3)
        .min_size(1)
        .max_age(Duration::from_secs(10))
        .build()
        .unwrap();
    pool.start().unwrap();
    assert!(pool.add(1).await);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(pool.add(2).await);
    assert!(pool.add(3).await);

    tokio::time::sleep(Duration::from_secs(5)).await;
    pool.sweep();
    settle().await;

    assert_eq!(recorder.discarded(), vec![(1, DiscardReason::Aged)]);
    assert_eq!(recorder.created(), 0);

    let stats = pool.stats();
    assert_eq!(stats.free, 2);
    assert_eq!(stats.minimum_instances, 1);
    assert_eq!(stats.instances_pooled, 2);
    assert_eq!(pool.pinned_free(), 1);
}

#[tokio::test(start_paused = true)]
async fn replacement_failure_shrinks_pinned_set() {
    let recorder = Recorder::new();
    recorder.set_failing(true);
    let pool = builder(&recorder)
        .max_size(2)
        .min_size(1)
        .max_age(Duration::from_secs(10))
        .build()
        .unwrap();
    pool.start().unwrap();
    assert!(pool.add(1).await);

    tokio::time::sleep(Duration::from_secs(11)).await;
    pool.sweep();
    settle().await;

    let stats = pool.stats();
    assert_eq!(stats.aged, 1);
    assert_eq!(stats.replaced, 1);
    assert_eq!(stats.free, 0);
    assert_eq!(stats.minimum_instances, 0);
    assert_eq!(stats.instances_pooled, 0);
    assert_eq!(stats.available_permits, 2);
}

#[tokio::test(start_paused = true)]
async fn periodic_sweeper_expires_idle_entries() {
    let recorder = Recorder::new();
    let pool: Pool<u32> = Pool::builder()
        .supplier(recorder.clone())
        .max_size(2)
        .idle_timeout(Duration::from_secs(5))
        .sweep_interval(Duration::from_secs(10))
        .build()
        .unwrap();
    pool.start().unwrap();
    pool.start().unwrap();
    assert!(pool.is_running());
    assert!(pool.add(1).await);

    tokio::time::sleep(Duration::from_secs(16)).await;
    settle().await;

    assert_eq!(recorder.discarded(), vec![(1, DiscardReason::Idle)]);
    assert!(pool.stats().sweeps >= 2);

    pool.stop();
    assert!(!pool.is_running());
    let sweeps = pool.stats().sweeps;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(pool.stats().sweeps, sweeps);
}

#[tokio::test(start_paused = true)]
async fn replacement_batch_is_staggered_across_max_age() {
    let recorder = Recorder::new();
    let pool = builder(&recorder)
        .max_size(4)
        .min_size(4)
        .max_age(Duration::from_secs(100))
        .replace_aged(true)
        .age_jitter_fraction(-1.0)
        .build()
        .unwrap();
    pool.start().unwrap();
    for value in 1..=4 {
        assert!(pool.add(value).await);
    }

    tokio::time::sleep(Duration::from_secs(101)).await;
    pool.sweep();
    settle().await;
    assert_eq!(recorder.created(), 4);

    let mut leased = Vec::new();
    for _ in 0..4 {
        let entry = pool.pop(Duration::ZERO).await.unwrap().unwrap();
        assert!(entry.is_pinned());
        leased.push(entry);
    }

    let mut created: Vec<_> = leased.iter().map(|entry| entry.created()).collect();
    created.sort_unstable();
    // max_age / n * fraction = 100s / 4 * -1.0
    for pair in created.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_secs(25));
    }
    for entry in leased {
        assert!(pool.push_entry(entry));
    }
}

#[tokio::test(start_paused = true)]
async fn oversized_jitter_does_not_leak_permits() {
    let recorder = Recorder::new();
    let pool = builder(&recorder)
        .max_size(2)
        .min_size(2)
        .max_age(Duration::from_secs(100))
        .age_jitter_fraction(1e308)
        .build()
        .unwrap();
    pool.start().unwrap();
    assert!(pool.add(1).await);
    assert!(pool.add(2).await);

    tokio::time::sleep(Duration::from_secs(101)).await;
    pool.sweep();
    settle().await;

    assert_eq!(recorder.created(), 2);
    let stats = pool.stats();
    assert_eq!(stats.free, 2);
    assert_eq!(stats.available_permits, 2);
    assert_eq!(stats.instances_pooled, 2);
    assert_eq!(pool.pinned_free(), 2);
}

#[test]
fn start_requires_runtime() {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let pool: Pool<u32> = Pool::builder()
        .executor(nebula_pool::TokioExecutor::new(rt.handle().clone()))
        .build()
        .unwrap();
    assert!(matches!(
        pool.start(),
        Err(nebula_pool::Error::Runtime { .. })
    ));
}
