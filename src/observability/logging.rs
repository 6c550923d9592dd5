//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for binaries embedding the crate
//! - Default filter keeps this crate at debug so swallowed rule-compare
//!   errors stay diagnosable

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a fmt subscriber with an env-driven filter. Safe to call when a
/// subscriber is already installed (keeps the existing one).
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lb_dispatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
