//! Dispatcher configuration: schema, loading, validation.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{BackendEntry, DispatcherConfig, RateLimitConfig};
pub use validation::{validate_config, ValidationError};
