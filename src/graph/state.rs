//! Shared key/value records.
//!
//! A `StateMap` backs each connection's state and the node's extension
//! slot. Clones are handles to the same record: a write through any clone
//! is visible through every other one. This is what lets approval hooks
//! populate a connection's state during the approval window, and what
//! `GraphNode::states` hands out (references, not copies).

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};

/// Aliased, mutable key/value record.
#[derive(Debug, Clone, Default)]
pub struct StateMap {
    inner: Arc<Mutex<Map<String, Value>>>,
}

/// State attached to one active connection.
pub type ConnectionState = StateMap;

impl StateMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Map<String, Value>> {
        // Values are plain JSON, a panicking writer cannot leave them half-built.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.lock().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Run `f` with exclusive access to the record.
    ///
    /// Do not call back into the same map from inside `f`.
    pub fn with<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        f(&mut self.lock())
    }

    /// Copy the current contents out.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.lock().clone()
    }

    /// True when both handles point at the same record.
    pub fn ptr_eq(&self, other: &StateMap) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clones_alias_the_same_record() {
        let state = StateMap::new();
        let alias = state.clone();

        alias.insert("accessed", true);
        assert_eq!(state.get("accessed"), Some(json!(true)));
        assert!(state.ptr_eq(&alias));
        assert!(!state.ptr_eq(&StateMap::new()));
    }

    #[test]
    fn snapshot_is_detached() {
        let state = StateMap::new();
        state.insert("n", 1);
        let snap = state.snapshot();
        state.insert("n", 2);
        assert_eq!(snap.get("n"), Some(&json!(1)));
        assert_eq!(state.get("n"), Some(json!(2)));
    }

    #[test]
    fn with_mutates_in_place() {
        let state = StateMap::new();
        state.with(|map| {
            map.insert("a".into(), json!("x"));
            map.insert("b".into(), json!("y"));
        });
        assert_eq!(state.len(), 2);
        assert_eq!(state.remove("a"), Some(json!("x")));
        assert!(!state.contains_key("a"));
        assert!(!state.is_empty());
    }
}
