//! Per-evaluation key/value context.
//!
//! # Responsibilities
//! - Hold the variables a rule program reads and writes
//! - Hold request-scoped objects (`$obj.property` access)
//!
//! # Design Decisions
//! - One context per evaluation; objects attach here instead of any
//!   process-wide table, so concurrent evaluations cannot observe each
//!   other's request state
//! - Internally locked, so a context is `Send + Sync` without caller
//!   coordination

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::value::Value;

/// Key/value store contract for rule evaluation.
pub trait Context {
    fn get_ctx_data(&self, key: &str) -> Option<Value>;
    fn set_ctx_data(&self, key: &str, value: Value);
    fn remove_ctx_data(&self, key: &str);
}

/// An object exposing named properties to rule programs via `$name.prop`.
pub trait Object: Send + Sync {
    fn get_property(&self, property: &str, ctx: &EvalContext) -> Option<Value>;
    fn set_property(&self, property: &str, value: Value, ctx: &EvalContext);
}

/// Default evaluation context.
#[derive(Default)]
pub struct EvalContext {
    data: RwLock<HashMap<String, Value>>,
    objects: RwLock<HashMap<String, Arc<dyn Object>>>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a request-scoped object under `name` (conventionally
    /// `$`-prefixed, like variables).
    pub fn register_object(&self, name: impl Into<String>, object: Arc<dyn Object>) {
        self.objects
            .write()
            .expect("context lock poisoned")
            .insert(name.into(), object);
    }

    pub fn get_object(&self, name: &str) -> Option<Arc<dyn Object>> {
        self.objects
            .read()
            .expect("context lock poisoned")
            .get(name)
            .cloned()
    }
}

impl Context for EvalContext {
    fn get_ctx_data(&self, key: &str) -> Option<Value> {
        if key.is_empty() {
            return None;
        }
        self.data
            .read()
            .expect("context lock poisoned")
            .get(key)
            .cloned()
    }

    fn set_ctx_data(&self, key: &str, value: Value) {
        if key.is_empty() {
            return;
        }
        self.data
            .write()
            .expect("context lock poisoned")
            .insert(key.to_string(), value);
    }

    fn remove_ctx_data(&self, key: &str) {
        if key.is_empty() {
            return;
        }
        self.data.write().expect("context lock poisoned").remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Value);

    impl Object for Fixed {
        fn get_property(&self, property: &str, _ctx: &EvalContext) -> Option<Value> {
            (property == "v").then(|| self.0.clone())
        }
        fn set_property(&self, _property: &str, _value: Value, _ctx: &EvalContext) {}
    }

    #[test]
    fn test_data_round_trip() {
        let ctx = EvalContext::new();
        ctx.set_ctx_data("$a", Value::Int(1));
        assert_eq!(ctx.get_ctx_data("$a"), Some(Value::Int(1)));
        ctx.remove_ctx_data("$a");
        assert_eq!(ctx.get_ctx_data("$a"), None);
        assert_eq!(ctx.get_ctx_data(""), None);
    }

    #[test]
    fn test_objects_are_context_scoped() {
        let ctx = EvalContext::new();
        ctx.register_object("$obj", Arc::new(Fixed(Value::Str("x".into()))));
        assert!(ctx.get_object("$obj").is_some());

        let other = EvalContext::new();
        assert!(other.get_object("$obj").is_none());
    }
}
