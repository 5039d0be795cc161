//! Background eviction controller.
//!
//! Each tick purges expired records, then trims the index to `max_size` by
//! removing the oldest records. Removal happens in batches; the index lock is
//! released and the task yields between batches so lookups and stores are
//! never held up for longer than one batch.

use super::index::Index;
use crate::time::Clock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// 0 = unbounded.
    pub max_size: u64,
    pub interval: Duration,
    pub batch: usize,
}

impl EvictionPolicy {
    fn bound(&self) -> Option<usize> {
        if self.max_size == 0 {
            None
        } else {
            Some(usize::try_from(self.max_size).unwrap_or(usize::MAX))
        }
    }
}

/// Outcome of one eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub expired: usize,
    pub evicted: usize,
}

impl PruneReport {
    pub fn removed(&self) -> usize {
        self.expired + self.evicted
    }
}

/// Running totals shared between the store and its controller.
#[derive(Debug, Default)]
pub struct EvictionCounters {
    pub expired: AtomicU64,
    pub evicted: AtomicU64,
}

impl EvictionCounters {
    fn record(&self, report: PruneReport) {
        self.expired
            .fetch_add(report.expired as u64, Ordering::Relaxed);
        self.evicted
            .fetch_add(report.evicted as u64, Ordering::Relaxed);
    }
}

/// One synchronous pass, looping over batches until within bounds.
pub fn prune_once<C: Clock>(
    index: &Index,
    clock: &C,
    policy: &EvictionPolicy,
    counters: &EvictionCounters,
) -> PruneReport {
    let mut report = PruneReport::default();
    let batch = policy.batch.max(1);
    let now = clock.now();
    loop {
        let removed = index.purge_expired_batch(now, batch);
        report.expired += removed;
        if removed < batch {
            break;
        }
    }
    if let Some(max) = policy.bound() {
        loop {
            let removed = index.evict_oldest_batch(max, batch);
            report.evicted += removed;
            if removed == 0 {
                break;
            }
        }
    }
    counters.record(report);
    report
}

async fn prune_cooperative<C: Clock>(
    index: &Index,
    clock: &C,
    policy: &EvictionPolicy,
    counters: &EvictionCounters,
) -> PruneReport {
    let mut report = PruneReport::default();
    let batch = policy.batch.max(1);
    let now = clock.now();
    loop {
        let removed = index.purge_expired_batch(now, batch);
        report.expired += removed;
        if removed < batch {
            break;
        }
        tokio::task::yield_now().await;
    }
    if let Some(max) = policy.bound() {
        loop {
            let removed = index.evict_oldest_batch(max, batch);
            report.evicted += removed;
            if removed == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
    }
    counters.record(report);
    report
}

/// Handle to a running controller task.
pub struct EvictionController {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl EvictionController {
    /// Spawn the controller on the current tokio runtime.
    ///
    /// Returns `None` when the interval is zero or no runtime is available;
    /// the store can still be pruned manually in that case.
    pub fn spawn<C: Clock>(
        index: Arc<Index>,
        clock: C,
        policy: EvictionPolicy,
        counters: Arc<EvictionCounters>,
    ) -> Option<Self> {
        if policy.interval.is_zero() {
            return None;
        }
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!(
                    interval_ms = policy.interval.as_millis() as u64,
                    "no tokio runtime; background eviction disabled"
                );
                return None;
            }
        };
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let handle = runtime.spawn(async move {
            let mut ticker = interval(policy.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = prune_cooperative(&index, &clock, &policy, &counters).await;
                        if report.removed() > 0 {
                            tracing::debug!(
                                expired = report.expired,
                                evicted = report.evicted,
                                remaining = index.len(),
                                "eviction pass"
                            );
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("eviction controller stopped");
        });
        Some(Self { shutdown, handle })
    }

    /// Signal the task to stop; it exits at its next wake-up.
    pub fn stop(self) {
        let _ = self.shutdown.send(true);
        drop(self.handle);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
