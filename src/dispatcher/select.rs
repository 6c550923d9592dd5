//! Selection policies over the backend sequence.
//!
//! All policies assume a non-empty sequence; the dispatcher returns
//! `NoBackends` before reaching them. Hash policies use FNV-1 32-bit so
//! routing stays stable for a fixed backend set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::backend::Backend;
use crate::expr::pipeline::fnv32;

/// Cursor and PRNG state shared by the rotating policies.
pub(crate) struct Selector {
    cursor: AtomicU64,
    rng: Mutex<StdRng>,
}

impl Selector {
    pub(crate) fn new() -> Self {
        Selector {
            cursor: AtomicU64::new(0),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub(crate) fn round_robin(&self, backends: &[Arc<Backend>]) -> Arc<Backend> {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) as usize % backends.len();
        Arc::clone(&backends[idx])
    }

    pub(crate) fn random(&self, backends: &[Arc<Backend>]) -> Arc<Backend> {
        let idx = self
            .rng
            .lock()
            .expect("selector rng lock poisoned")
            .gen_range(0..backends.len());
        Arc::clone(&backends[idx])
    }

    /// Work-conserving pick: start at the rotating cursor and take that
    /// backend outright when it is idle; otherwise scan the whole sequence
    /// for the lowest `pending + health_fail_score`.
    pub(crate) fn min_pending(&self, backends: &[Arc<Backend>]) -> Arc<Backend> {
        let n = backends.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) as usize % n;
        let mut min_idx = start;
        let mut min_load = backends[start].effective_load();
        if min_load > 0 {
            let mut idx = start;
            for _ in 0..n {
                idx = (idx + 1) % n;
                let load = backends[idx].effective_load();
                if load < min_load {
                    min_load = load;
                    min_idx = idx;
                }
            }
        }
        Arc::clone(&backends[min_idx])
    }
}

pub(crate) fn ip_hash(backends: &[Arc<Backend>], client_ip: &str) -> Arc<Backend> {
    let idx = fnv32(client_ip) as usize % backends.len();
    Arc::clone(&backends[idx])
}

pub(crate) fn url_param(backends: &[Arc<Backend>], param_value: &str) -> Arc<Backend> {
    let idx = fnv32(param_value) as usize % backends.len();
    Arc::clone(&backends[idx])
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn backends(n: usize) -> Vec<Arc<Backend>> {
        (0..n)
            .map(|i| {
                Arc::new(
                    Backend::connect(
                        &format!("127.0.0.1:{}", 8080 + i),
                        &format!("b{i}"),
                        10,
                        Duration::from_secs(3),
                        None,
                    )
                    .unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_round_robin_rotates_in_order() {
        let selector = Selector::new();
        let list = backends(3);
        let picks: Vec<String> = (0..6)
            .map(|_| selector.round_robin(&list).alias().to_string())
            .collect();
        assert_eq!(picks, vec!["b0", "b1", "b2", "b0", "b1", "b2"]);
    }

    #[test]
    fn test_min_pending_prefers_lowest_effective_load() {
        let selector = Selector::new();
        let list = backends(3);
        // b0 carries 5 in-flight requests, b1 and b2 carry 2 each.
        let _g0: Vec<_> = (0..5).map(|_| list[0].track_pending()).collect();
        let _g1: Vec<_> = (0..2).map(|_| list[1].track_pending()).collect();
        let _g2: Vec<_> = (0..2).map(|_| list[2].track_pending()).collect();
        // Cursor starts at b0: scan finds b1 first among the minimum.
        assert_eq!(selector.min_pending(&list).alias(), "b1");
    }

    #[test]
    fn test_min_pending_takes_idle_start_without_scanning() {
        let selector = Selector::new();
        let list = backends(3);
        let _g1 = list[1].track_pending();
        // b0 is idle and the cursor starts there.
        assert_eq!(selector.min_pending(&list).alias(), "b0");
    }

    #[test]
    fn test_min_pending_counts_health_penalty() {
        let selector = Selector::new();
        let list = backends(2);
        // b0 has no traffic but a fail score of 3; b1 has one request.
        for _ in 0..3 {
            list[0].record_health(false);
        }
        let _g1 = list[1].track_pending();
        assert_eq!(selector.min_pending(&list).alias(), "b1");
    }

    #[test]
    fn test_ip_hash_is_stable() {
        let list = backends(3);
        let first = ip_hash(&list, "10.0.0.1").alias().to_string();
        for _ in 0..10 {
            assert_eq!(ip_hash(&list, "10.0.0.1").alias(), first);
        }
        // A one-element set always hashes to that element.
        let single = backends(1);
        assert_eq!(ip_hash(&single, "10.0.0.1").alias(), "b0");
    }

    #[test]
    fn test_random_stays_in_bounds() {
        let selector = Selector::new();
        let list = backends(2);
        for _ in 0..50 {
            let pick = selector.random(&list);
            assert!(pick.alias() == "b0" || pick.alias() == "b1");
        }
    }
}
