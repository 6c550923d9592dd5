//! Dispatcher error definitions.

use thiserror::Error;

use crate::expr::ExprError;

/// Errors surfaced by registration, rule installation, and dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A backend with this alias is already registered.
    #[error("backend alias {0:?} already exists")]
    AliasExists(String),

    /// No backend with this alias is registered.
    #[error("backend alias {0:?} not found")]
    AliasNotFound(String),

    /// The backend address is not a valid `host:port` endpoint.
    #[error("invalid backend address {0:?}")]
    InvalidAddress(String),

    /// The backend sequence is empty.
    #[error("no backends registered")]
    NoBackends,

    /// Rule-based selection did not produce a registered alias.
    #[error("rule selection failed: {0}")]
    RuleSelectionFailed(String),

    /// Rule program parse or evaluation error.
    #[error(transparent)]
    Rule(#[from] ExprError),

    /// The upstream request failed in the transport.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    /// The upstream did not return response headers within the configured
    /// window.
    #[error("upstream did not return response headers in time")]
    UpstreamTimeout,
}

/// Result type for dispatcher operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
