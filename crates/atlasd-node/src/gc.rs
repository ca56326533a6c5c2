//! Optimistic GC Ticker (spec §4.7): a background pulse that concentrates
//! collection pauses during request activity rather than between them.
//! An owned `tokio::spawn` loop driven by a lock-free `AtomicU64` event
//! counter the RPC dispatcher bumps once per request.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::debug;

const TICK_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);
const DEFAULT_EVENT_THRESHOLD: u64 = 15;

/// Shared handle: the RPC dispatcher increments `event_count` once per
/// request; the ticker task owns the deadline clock.
pub struct GcTicker {
    event_count: AtomicU64,
    event_threshold: u64,
    deadline: Duration,
    running: AtomicBool,
    collections: AtomicU64,
}

impl GcTicker {
    pub fn new() -> Arc<Self> {
        Self::with_params(DEFAULT_EVENT_THRESHOLD, DEFAULT_DEADLINE)
    }

    pub fn with_params(event_threshold: u64, deadline: Duration) -> Arc<Self> {
        Arc::new(Self {
            event_count: AtomicU64::new(0),
            event_threshold,
            deadline,
            running: AtomicBool::new(true),
            collections: AtomicU64::new(0),
        })
    }

    /// Called once per dispatched RPC (§4.7).
    pub fn note_event(&self) {
        self.event_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn collections(&self) -> u64 {
        self.collections.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Spawns the ticker as its own task; returns the join handle so the
    /// lifecycle supervisor can await it on shutdown.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut last_collection = Instant::now();
            while self.running.load(Ordering::SeqCst) {
                sleep(TICK_INTERVAL).await;
                let deadline_hit = last_collection.elapsed() >= self.deadline;
                let events_hit = self.event_count.load(Ordering::Relaxed) >= self.event_threshold;
                if deadline_hit || events_hit {
                    debug!(deadline_hit, events_hit, "triggering optimistic collection");
                    self.event_count.store(0, Ordering::Relaxed);
                    last_collection = Instant::now();
                    self.collections.fetch_add(1, Ordering::Relaxed);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn triggers_on_event_threshold_before_deadline() {
        let ticker = GcTicker::with_params(3, Duration::from_secs(3600));
        let handle = ticker.clone().spawn();
        for _ in 0..3 {
            ticker.note_event();
        }
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(ticker.collections() >= 1);
        ticker.stop();
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    }

    #[tokio::test]
    async fn stop_ends_the_task() {
        let ticker = GcTicker::new();
        let handle = ticker.clone().spawn();
        ticker.stop();
        let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(result.is_ok());
    }
}
