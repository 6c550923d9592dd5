//! Configuration validation logic.

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::dispatcher::LbMethod;

use super::schema::DispatcherConfig;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.0)
    }
}

/// Validate a DispatcherConfig for semantic correctness.
pub fn validate_config(config: &DispatcherConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // 1. Aliases must be unique and addresses must be concrete endpoints.
    let mut seen: HashSet<&str> = HashSet::new();
    for backend in &config.backends {
        if !seen.insert(backend.alias.as_str()) {
            errors.push(ValidationError(format!(
                "duplicate backend alias '{}'",
                backend.alias
            )));
        }
        if backend.address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError(format!(
                "backend '{}' has invalid address '{}'",
                backend.alias, backend.address
            )));
        }
    }

    // 2. Policy-specific requirements.
    if config.method == LbMethod::UrlParam && config.url_param_key.is_empty() {
        errors.push(ValidationError(
            "url_param_key must be set for the url_param policy".to_string(),
        ));
    }
    if config.method == LbMethod::RuleBased && config.rules.is_none() {
        errors.push(ValidationError(
            "rules must be set for the rule_based policy".to_string(),
        ));
    }

    // 3. Rate limiting bounds.
    if config.rate_limit.enabled && config.rate_limit.qps < 100 {
        errors.push(ValidationError(
            "rate_limit.qps must be >= 100".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
