//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::dispatcher::LbMethod;

/// Root configuration for a dispatcher.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Backend selection policy.
    pub method: LbMethod,

    /// Idle connection cap per backend host.
    pub max_idle_per_host: usize,

    /// Query parameter hashed under the `url_param` policy.
    pub url_param_key: String,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Response-header wait timeout in milliseconds.
    pub response_header_timeout_ms: u64,

    /// Backends registered at construction.
    pub backends: Vec<BackendEntry>,

    /// Inline rule program JSON for the `rule_based` policy.
    pub rules: Option<String>,

    /// Admission control settings.
    pub rate_limit: RateLimitConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            method: LbMethod::RoundRobin,
            max_idle_per_host: default_max_idle(),
            url_param_key: String::new(),
            connect_timeout_ms: 3_000,
            response_header_timeout_ms: 1_000,
            backends: Vec::new(),
            rules: None,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// A backend to register at construction.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendEntry {
    /// Destination `host:port`.
    pub address: String,

    /// Unique alias within the dispatcher.
    pub alias: String,
}

/// Token-bucket admission control configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Consult a token bucket before dispatching.
    pub enabled: bool,

    /// Sustained requests per second (minimum 100).
    pub qps: i64,

    /// Bucket capacity (burst headroom).
    pub capacity: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            qps: 1_000,
            capacity: 1_000,
        }
    }
}

fn default_max_idle() -> usize {
    10
}
