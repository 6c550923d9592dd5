//! Load-balancing HTTP dispatcher.
//!
//! # Data Flow
//! ```text
//! dispatch(client_ip, request)
//!     → registry.rs (snapshot backends under a short read lock)
//!     → select.rs (apply the configured selection policy)
//!         - round robin / random / min pending
//!         - ip hash / url param (FNV-1 32-bit)
//!         - rule based (expression engine over request attributes)
//!     → backend.rs (rewrite target, pooled hyper client, pending guard)
//!     → health scoring (fail score up on failure, halved on success)
//!     → Return upstream response or error
//! ```
//!
//! # Design Decisions
//! - Backends are registered and removed under live traffic; removal
//!   orphans the pending counter and lets in-flight requests drain
//! - The registry lock is never held across I/O
//! - Rule evaluation sees the request URI as a context-scoped object, so
//!   concurrent dispatches cannot bleed into each other

pub mod backend;
pub mod body;
pub mod client;
pub mod error;
pub mod registry;
pub mod select;

pub use backend::{default_health_check, Backend, HealthCheck};
pub use body::DispatchBody;
pub use client::{LbClient, LbMethod};
pub use error::{DispatchError, DispatchResult};
