//! Logging and metrics plumbing.

pub mod logging;
pub mod metrics;
