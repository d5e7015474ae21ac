//! Process-local memory store

use parking_lot::Mutex;
use std::collections::HashMap;

/// Two-level map of function name to key to value, behind one mutex
#[derive(Debug)]
pub struct MemoryStore<T> {
    entries: Mutex<HashMap<String, HashMap<String, T>>>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> MemoryStore<T> {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value of `function` for `key`
    pub fn get(&self, function: &str, key: &str) -> Option<T> {
        self.entries.lock().get(function)?.get(key).cloned()
    }

    /// Store a value, replacing any previous one
    pub fn insert(&self, function: &str, key: &str, value: T) {
        self.entries
            .lock()
            .entry(function.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Drop every entry of `function`. Returns whether any existed.
    pub fn remove_function(&self, function: &str) -> bool {
        self.entries.lock().remove(function).is_some()
    }

    /// Number of entries held for `function`
    pub fn len(&self, function: &str) -> usize {
        self.entries.lock().get(function).map_or(0, HashMap::len)
    }

    /// Whether nothing is cached for `function`
    pub fn is_empty(&self, function: &str) -> bool {
        self.len(function) == 0
    }
}
