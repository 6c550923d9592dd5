//! Backend registry.
//!
//! # Responsibilities
//! - Map aliases to backends and keep the registration order
//! - Hand out consistent snapshots for selection
//!
//! # Design Decisions
//! - One reader/writer lock guards both collections so the alias map and
//!   the ordered sequence can never disagree
//! - The lock is held only across map/vec operations, never across I/O

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::backend::Backend;
use super::error::{DispatchError, DispatchResult};

#[derive(Default)]
pub(crate) struct Registry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    list: Vec<Arc<Backend>>,
    by_alias: HashMap<String, Arc<Backend>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a backend. Fails when the alias is taken.
    pub(crate) fn insert(&self, backend: Backend) -> DispatchResult<()> {
        let mut inner = self.inner.write().expect("backend registry lock poisoned");
        if inner.by_alias.contains_key(backend.alias()) {
            return Err(DispatchError::AliasExists(backend.alias().to_string()));
        }
        let backend = Arc::new(backend);
        inner
            .by_alias
            .insert(backend.alias().to_string(), Arc::clone(&backend));
        inner.list.push(backend);
        Ok(())
    }

    /// Remove a backend, preserving the relative order of the rest.
    /// In-flight requests keep their `Arc` and drain on their own.
    pub(crate) fn remove(&self, alias: &str) -> DispatchResult<()> {
        let mut inner = self.inner.write().expect("backend registry lock poisoned");
        if inner.by_alias.remove(alias).is_none() {
            return Err(DispatchError::AliasNotFound(alias.to_string()));
        }
        inner.list.retain(|b| b.alias() != alias);
        Ok(())
    }

    /// The ordered backend sequence at this instant.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Backend>> {
        self.inner
            .read()
            .expect("backend registry lock poisoned")
            .list
            .clone()
    }

    pub(crate) fn get(&self, alias: &str) -> Option<Arc<Backend>> {
        self.inner
            .read()
            .expect("backend registry lock poisoned")
            .by_alias
            .get(alias)
            .cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner
            .read()
            .expect("backend registry lock poisoned")
            .list
            .len()
    }

    /// Aliases in registration order.
    pub(crate) fn aliases(&self) -> Vec<String> {
        self.inner
            .read()
            .expect("backend registry lock poisoned")
            .list
            .iter()
            .map(|b| b.alias().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn backend(alias: &str) -> Backend {
        Backend::connect("127.0.0.1:8080", alias, 10, Duration::from_secs(3), None).unwrap()
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let registry = Registry::new();
        registry.insert(backend("a")).unwrap();
        assert!(matches!(
            registry.insert(backend("a")),
            Err(DispatchError::AliasExists(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_preserves_order() {
        let registry = Registry::new();
        for alias in ["a", "b", "c"] {
            registry.insert(backend(alias)).unwrap();
        }
        registry.remove("b").unwrap();
        assert_eq!(registry.aliases(), vec!["a", "c"]);
        assert!(registry.get("b").is_none());
        assert!(matches!(
            registry.remove("b"),
            Err(DispatchError::AliasNotFound(_))
        ));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = Registry::new();
        registry.insert(backend("a")).unwrap();
        let snap = registry.snapshot();
        registry.remove("a").unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(registry.len(), 0);
    }
}
