//! Token bucket rate limiter.
//!
//! # Responsibilities
//! - Admit or reject requests at a configured QPS without blocking
//! - Refill tokens from a background task every 100ms
//!
//! # Design Decisions
//! - Refill amount per tick is `ceil(qps / 10) + 1`, saturating at capacity;
//!   capacity is raised to the refill amount when configured smaller
//! - QPS updates travel over a single-slot channel to the refiller; rates
//!   below 100 are ignored
//! - Acquisition is a lock-free decrement-if-positive, so the count never
//!   goes negative

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;

const REFILL_INTERVAL: Duration = Duration::from_millis(100);
const MIN_QPS: i64 = 100;

/// A refilling counter used to admit or reject requests.
pub struct TokenBucket {
    shared: Arc<Shared>,
    qps_tx: mpsc::Sender<i64>,
    stop_tx: mpsc::Sender<()>,
}

struct Shared {
    tokens: AtomicI64,
    capacity: AtomicI64,
}

impl TokenBucket {
    /// Build a bucket and spawn its refiller. Returns `None` when `qps` is
    /// below 100. Must be called within a tokio runtime.
    pub fn new(capacity: i64, qps: i64) -> Option<TokenBucket> {
        if qps < MIN_QPS {
            return None;
        }
        let rate = refill_amount(qps);
        let shared = Arc::new(Shared {
            tokens: AtomicI64::new(rate),
            capacity: AtomicI64::new(capacity.max(rate)),
        });
        let (qps_tx, qps_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = mpsc::channel(1);
        tokio::spawn(refill_loop(Arc::clone(&shared), rate, qps_rx, stop_rx));
        Some(TokenBucket {
            shared,
            qps_tx,
            stop_tx,
        })
    }

    /// Take one token. Returns false immediately when the bucket is empty.
    pub fn try_acquire(&self) -> bool {
        self.shared
            .tokens
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |tokens| {
                (tokens > 0).then(|| tokens - 1)
            })
            .is_ok()
    }

    /// Hand a new rate to the refiller. Rates below 100 are ignored there.
    pub async fn set_qps(&self, qps: i64) {
        let _ = self.qps_tx.send(qps).await;
    }

    /// Terminate the refiller. Safe to call more than once.
    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }

    pub fn tokens(&self) -> i64 {
        self.shared.tokens.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> i64 {
        self.shared.capacity.load(Ordering::Relaxed)
    }
}

impl Drop for TokenBucket {
    fn drop(&mut self) {
        self.stop();
    }
}

fn refill_amount(qps: i64) -> i64 {
    (qps + 9) / 10 + 1
}

async fn refill_loop(
    shared: Arc<Shared>,
    mut rate: i64,
    mut qps_rx: mpsc::Receiver<i64>,
    mut stop_rx: mpsc::Receiver<()>,
) {
    let start = time::Instant::now() + REFILL_INTERVAL;
    let mut ticker = time::interval_at(start, REFILL_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let capacity = shared.capacity.load(Ordering::Relaxed);
                let refilled = (shared.tokens.load(Ordering::Relaxed) + rate).min(capacity);
                shared.tokens.store(refilled, Ordering::Relaxed);
            }
            Some(qps) = qps_rx.recv() => {
                if qps < MIN_QPS {
                    continue;
                }
                rate = refill_amount(qps);
                shared.capacity.fetch_max(rate, Ordering::Relaxed);
            }
            _ = stop_rx.recv() => {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_low_qps() {
        assert!(TokenBucket::new(1000, 99).is_none());
        assert!(TokenBucket::new(1000, 100).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_tokens_and_drain() {
        let bucket = TokenBucket::new(1000, 1000).unwrap();
        // One refill amount is available up front.
        assert_eq!(bucket.tokens(), 101);
        for _ in 0..101 {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());
        assert_eq!(bucket.tokens(), 0);
    }

    #[tokio::test]
    async fn test_capacity_raised_to_refill_amount() {
        let bucket = TokenBucket::new(10, 1000).unwrap();
        assert_eq!(bucket.capacity(), 101);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_tick_adds_rate_up_to_capacity() {
        let bucket = TokenBucket::new(1000, 1000).unwrap();
        assert_eq!(bucket.tokens(), 101);

        time::sleep(Duration::from_millis(150)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(bucket.tokens(), 202);

        // Nine more ticks saturate at capacity.
        time::sleep(Duration::from_millis(900)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(bucket.tokens(), 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_qps_changes_rate() {
        let bucket = TokenBucket::new(10_000, 1000).unwrap();
        bucket.set_qps(2000).await;
        time::sleep(Duration::from_millis(150)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        // First tick after the update adds ceil(2000/10)+1.
        assert_eq!(bucket.tokens(), 101 + 201);

        // Updates below the minimum are ignored.
        bucket.set_qps(50).await;
        time::sleep(Duration::from_millis(100)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(bucket.tokens(), 101 + 201 + 201);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_refills() {
        let bucket = TokenBucket::new(1000, 1000).unwrap();
        bucket.stop();
        bucket.stop();
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        time::sleep(Duration::from_millis(300)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(bucket.tokens(), 101);
    }
}
