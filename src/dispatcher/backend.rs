//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server keyed by alias
//! - Own the backend's pooled HTTP client
//! - Track in-flight requests (for min-pending selection)
//! - Track the passive health-fail score
//!
//! # Design Decisions
//! - Counters are atomics; the pending count is managed by an RAII guard so
//!   the decrement survives transport errors
//! - The health-fail score adds onto pending as a selection penalty:
//!   it grows by one per failed health check and halves on success

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http::request::Parts;
use http::Response;
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use super::body::DispatchBody;
use super::error::{DispatchError, DispatchResult};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Decides whether an exchange counts as healthy. Receives the forwarded
/// request head, the response when one arrived, and the error otherwise.
pub type HealthCheck =
    Arc<dyn Fn(&Parts, Option<&Response<Incoming>>, Option<&DispatchError>) -> bool + Send + Sync>;

/// Default health check: any response, whatever its status, is healthy.
pub fn default_health_check(
    _req: &Parts,
    _resp: Option<&Response<Incoming>>,
    err: Option<&DispatchError>,
) -> bool {
    err.is_none()
}

/// A single upstream server.
pub struct Backend {
    alias: String,
    addr: SocketAddr,
    pub(crate) transport: Client<HttpConnector, DispatchBody>,
    pending: AtomicI64,
    health_fail_score: AtomicI64,
    pub(crate) health_check: HealthCheck,
}

impl Backend {
    /// Build a backend with a freshly configured pooled client. The address
    /// must be a concrete `host:port` endpoint.
    pub(crate) fn connect(
        address: &str,
        alias: &str,
        max_idle_per_host: usize,
        connect_timeout: Duration,
        health_check: Option<HealthCheck>,
    ) -> DispatchResult<Backend> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|_| DispatchError::InvalidAddress(address.to_string()))?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_keepalive(Some(KEEP_ALIVE));

        let transport = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(max_idle_per_host)
            .pool_idle_timeout(IDLE_TIMEOUT)
            .build(connector);

        Ok(Backend {
            alias: alias.to_string(),
            addr,
            transport,
            pending: AtomicI64::new(0),
            health_fail_score: AtomicI64::new(0),
            health_check: health_check
                .unwrap_or_else(|| Arc::new(default_health_check) as HealthCheck),
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Requests currently in flight through this backend.
    pub fn pending(&self) -> i64 {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn health_fail_score(&self) -> i64 {
        self.health_fail_score.load(Ordering::Relaxed)
    }

    /// Selection weight for min-pending: in-flight requests plus the health
    /// penalty.
    pub(crate) fn effective_load(&self) -> i64 {
        self.pending() + self.health_fail_score()
    }

    /// Count an in-flight request. The guard decrements on drop, including
    /// on the error path.
    pub(crate) fn track_pending(self: &Arc<Self>) -> PendingGuard {
        self.pending.fetch_add(1, Ordering::Relaxed);
        PendingGuard {
            backend: Arc::clone(self),
        }
    }

    /// Fold a health-check verdict into the fail score.
    pub(crate) fn record_health(&self, healthy: bool) {
        if healthy {
            let halved = self.health_fail_score.load(Ordering::Relaxed) / 2;
            self.health_fail_score.store(halved, Ordering::Relaxed);
        } else {
            self.health_fail_score.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("alias", &self.alias)
            .field("addr", &self.addr)
            .field("pending", &self.pending())
            .field("health_fail_score", &self.health_fail_score())
            .finish()
    }
}

/// RAII guard for the pending-request count.
pub(crate) struct PendingGuard {
    backend: Arc<Backend>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.backend.pending.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(addr: &str) -> Arc<Backend> {
        Arc::new(
            Backend::connect(addr, "b", 10, Duration::from_secs(3), None).unwrap(),
        )
    }

    #[test]
    fn test_invalid_address_rejected() {
        let err = Backend::connect("not-an-endpoint", "b", 10, Duration::from_secs(3), None)
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidAddress(_)));
    }

    #[test]
    fn test_pending_guard_balances() {
        let b = backend("127.0.0.1:8080");
        {
            let _g1 = b.track_pending();
            let _g2 = b.track_pending();
            assert_eq!(b.pending(), 2);
        }
        assert_eq!(b.pending(), 0);
    }

    #[test]
    fn test_health_score_grows_and_halves() {
        let b = backend("127.0.0.1:8080");
        for _ in 0..5 {
            b.record_health(false);
        }
        assert_eq!(b.health_fail_score(), 5);
        b.record_health(true);
        assert_eq!(b.health_fail_score(), 2);
        b.record_health(true);
        assert_eq!(b.health_fail_score(), 1);
        assert_eq!(b.effective_load(), 1);
    }
}
