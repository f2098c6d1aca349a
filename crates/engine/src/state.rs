//! The State Manager: workflow variables, a single accumulator slot, a
//! single counter slot, a TTL cache, and two context namespaces — each
//! sub-store behind its own `parking_lot::RwLock` so a long reader on one
//! never blocks a writer on another.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expiration: Instant,
}

#[derive(Default)]
pub struct StateManager {
    variables: RwLock<HashMap<String, Value>>,
    context_variables: RwLock<HashMap<String, Value>>,
    context_constants: RwLock<HashMap<String, Value>>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    accumulator: RwLock<Value>,
    counter: RwLock<f64>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- variables ----

    pub fn get_variable(&self, name: &str) -> Option<Value> {
        self.variables.read().get(name).cloned()
    }

    pub fn set_variable(&self, name: &str, value: Value) {
        self.variables.write().insert(name.to_string(), value);
    }

    pub fn list_variables(&self) -> HashMap<String, Value> {
        self.variables.read().clone()
    }

    pub fn variable_count(&self) -> usize {
        self.variables.read().len()
    }

    // ---- context namespaces ----

    pub fn get_context_variable(&self, name: &str) -> Option<Value> {
        self.context_variables.read().get(name).cloned()
    }

    pub fn set_context_variable(&self, name: &str, value: Value) {
        self.context_variables.write().insert(name.to_string(), value);
    }

    pub fn get_context_constant(&self, name: &str) -> Option<Value> {
        self.context_constants.read().get(name).cloned()
    }

    pub fn set_context_constant(&self, name: &str, value: Value) {
        self.context_constants.write().insert(name.to_string(), value);
    }

    pub fn list_context_variables(&self) -> HashMap<String, Value> {
        self.context_variables.read().clone()
    }

    pub fn list_context_constants(&self) -> HashMap<String, Value> {
        self.context_constants.read().clone()
    }

    /// Resolves `context.NAME` against variables first, then constants —
    /// used by the evaluator and by template interpolation.
    pub fn get_context(&self, name: &str) -> Option<Value> {
        self.get_context_variable(name).or_else(|| self.get_context_constant(name))
    }

    // ---- accumulator / counter ----

    pub fn get_accumulator(&self) -> Value {
        self.accumulator.read().clone()
    }

    pub fn set_accumulator(&self, value: Value) {
        *self.accumulator.write() = value;
    }

    pub fn get_counter(&self) -> f64 {
        *self.counter.read()
    }

    pub fn set_counter(&self, value: f64) {
        *self.counter.write() = value;
    }

    pub fn increment_counter(&self, delta: f64) -> f64 {
        let mut counter = self.counter.write();
        *counter += delta;
        *counter
    }

    // ---- TTL cache ----

    pub fn get_cache(&self, key: &str) -> Option<Value> {
        let cache = self.cache.read();
        match cache.get(key) {
            Some(entry) if entry.expiration > Instant::now() => Some(entry.value.clone()),
            _ => None,
        }
    }

    pub fn set_cache(&self, key: &str, value: Value, ttl: Duration) {
        let mut cache = self.cache.write();
        cache.retain(|_, entry| entry.expiration > Instant::now());
        cache.insert(key.to_string(), CacheEntry { value, expiration: Instant::now() + ttl });
    }

    /// Snapshot of all live (unexpired) cache entries and their remaining
    /// TTL, for [`crate::snapshot::Snapshot`].
    pub fn cache_snapshot(&self) -> Vec<(String, Value, Duration)> {
        let now = Instant::now();
        self.cache
            .read()
            .iter()
            .filter(|(_, entry)| entry.expiration > now)
            .map(|(key, entry)| (key.clone(), entry.value.clone(), entry.expiration - now))
            .collect()
    }

    pub fn restore_cache_entry(&self, key: String, value: Value, remaining_ttl: Duration) {
        self.cache.write().insert(key, CacheEntry { value, expiration: Instant::now() + remaining_ttl });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;

    #[test]
    fn cache_entries_expire() {
        let state = StateManager::new();
        state.set_cache("k", json!(1), Duration::from_millis(10));
        assert_eq!(state.get_cache("k"), Some(json!(1)));
        sleep(Duration::from_millis(20));
        assert_eq!(state.get_cache("k"), None);
    }

    #[test]
    fn counter_increments_and_resets() {
        let state = StateManager::new();
        assert_eq!(state.increment_counter(1.0), 1.0);
        assert_eq!(state.increment_counter(2.5), 3.5);
        state.set_counter(0.0);
        assert_eq!(state.get_counter(), 0.0);
    }

    #[test]
    fn variables_last_write_wins() {
        let state = StateManager::new();
        state.set_variable("x", json!(1));
        state.set_variable("x", json!(2));
        assert_eq!(state.get_variable("x"), Some(json!(2)));
    }
}
