//! Snapshot (de)serialization: a fully self-contained record of an
//! execution's state at a point in time, reloadable into a fresh `Engine`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use nodes::{Config, Node};

use crate::error::EngineError;
use crate::models::Edge;
use crate::state::StateManager;

/// The current snapshot format. [`Snapshot::from_json`] rejects any other
/// value as a hard error — spec.md §4.5 calls this out explicitly.
pub const SNAPSHOT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntrySnapshot {
    pub key: String,
    pub value: Value,
    pub remaining_ttl_ms: u64,
}

/// The full serializable record described in spec.md §3 and §4.5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub workflow_id: String,
    pub execution_id: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub node_results: HashMap<String, Value>,
    pub completed_nodes: Vec<String>,
    pub errors: Vec<String>,
    pub variables: HashMap<String, Value>,
    pub context_variables: HashMap<String, Value>,
    pub context_constants: HashMap<String, Value>,
    pub accumulator: Value,
    pub counter: f64,
    pub cache: Vec<CacheEntrySnapshot>,
    pub node_execution_count: u64,
    pub http_call_count: u64,
    #[serde(with = "config_wire")]
    pub config: Config,
}

impl Snapshot {
    /// Validates the version tag before attempting to use any other field.
    pub fn from_json(value: Value) -> Result<Self, EngineError> {
        let version = value
            .get("version")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::Snapshot("missing 'version' field".to_string()))?;
        if version != SNAPSHOT_VERSION {
            return Err(EngineError::Snapshot(format!(
                "unsupported snapshot version '{version}', expected '{SNAPSHOT_VERSION}'"
            )));
        }
        serde_json::from_value(value).map_err(|e| EngineError::Snapshot(e.to_string()))
    }

    pub fn to_json(&self) -> Result<Value, EngineError> {
        serde_json::to_value(self).map_err(|e| EngineError::Snapshot(e.to_string()))
    }

    /// Restores a [`StateManager`] from this snapshot's captured maps.
    /// Cache entries whose remaining TTL already hit zero are dropped.
    pub fn restore_state(&self) -> StateManager {
        let state = StateManager::new();
        for (name, value) in &self.variables {
            state.set_variable(name, value.clone());
        }
        for (name, value) in &self.context_variables {
            state.set_context_variable(name, value.clone());
        }
        for (name, value) in &self.context_constants {
            state.set_context_constant(name, value.clone());
        }
        state.set_accumulator(self.accumulator.clone());
        state.set_counter(self.counter);
        for entry in &self.cache {
            if entry.remaining_ttl_ms > 0 {
                state.restore_cache_entry(entry.key.clone(), entry.value.clone(), Duration::from_millis(entry.remaining_ttl_ms));
            }
        }
        state
    }
}

/// `Config` has no `Serialize`/`Deserialize` of its own (it lives in the
/// `nodes` crate as a plain settings struct); snapshot it through a mirror
/// struct instead of adding a wire format to a crate that otherwise has
/// none.
mod config_wire {
    use super::*;
    use nodes::BackoffStrategy;
    use serde::{Deserializer, Serializer};

    #[derive(Serialize, Deserialize)]
    struct ConfigWire {
        max_execution_time_ms: u64,
        max_node_executions: u64,
        max_http_calls_per_exec: u64,
        max_iterations: u64,
        max_for_each_iterations: u64,
        max_nodes: usize,
        max_edges: usize,
        max_string_length: usize,
        max_array_length: usize,
        max_context_depth: usize,
        max_variables: usize,
        allow_http: bool,
        allow_localhost: bool,
        allow_private_ips: bool,
        allow_link_local: bool,
        allow_cloud_metadata: bool,
        allowed_domains: Vec<String>,
        default_max_attempts: u32,
        default_backoff: BackoffStrategy,
        max_http_timeout_ms: u64,
    }

    pub fn serialize<S: Serializer>(config: &Config, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = ConfigWire {
            max_execution_time_ms: config.max_execution_time.as_millis() as u64,
            max_node_executions: config.max_node_executions,
            max_http_calls_per_exec: config.max_http_calls_per_exec,
            max_iterations: config.max_iterations,
            max_for_each_iterations: config.max_for_each_iterations,
            max_nodes: config.max_nodes,
            max_edges: config.max_edges,
            max_string_length: config.max_string_length,
            max_array_length: config.max_array_length,
            max_context_depth: config.max_context_depth,
            max_variables: config.max_variables,
            allow_http: config.allow_http,
            allow_localhost: config.allow_localhost,
            allow_private_ips: config.allow_private_ips,
            allow_link_local: config.allow_link_local,
            allow_cloud_metadata: config.allow_cloud_metadata,
            allowed_domains: config.allowed_domains.clone(),
            default_max_attempts: config.default_max_attempts,
            default_backoff: config.default_backoff,
            max_http_timeout_ms: config.max_http_timeout.as_millis() as u64,
        };
        wire.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Config, D::Error> {
        let wire = ConfigWire::deserialize(deserializer)?;
        Ok(Config {
            max_execution_time: Duration::from_millis(wire.max_execution_time_ms),
            max_node_executions: wire.max_node_executions,
            max_http_calls_per_exec: wire.max_http_calls_per_exec,
            max_iterations: wire.max_iterations,
            max_for_each_iterations: wire.max_for_each_iterations,
            max_nodes: wire.max_nodes,
            max_edges: wire.max_edges,
            max_string_length: wire.max_string_length,
            max_array_length: wire.max_array_length,
            max_context_depth: wire.max_context_depth,
            max_variables: wire.max_variables,
            allow_http: wire.allow_http,
            allow_localhost: wire.allow_localhost,
            allow_private_ips: wire.allow_private_ips,
            allow_link_local: wire.allow_link_local,
            allow_cloud_metadata: wire.allow_cloud_metadata,
            allowed_domains: wire.allowed_domains,
            default_max_attempts: wire.default_max_attempts,
            default_backoff: wire.default_backoff,
            max_http_timeout: Duration::from_millis(wire.max_http_timeout_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION.to_string(),
            created_at: Utc::now(),
            workflow_id: "wf1".to_string(),
            execution_id: "exec1".to_string(),
            nodes: vec![],
            edges: vec![],
            node_results: HashMap::from([("n1".to_string(), json!(15))]),
            completed_nodes: vec!["n1".to_string()],
            errors: vec![],
            variables: HashMap::new(),
            context_variables: HashMap::new(),
            context_constants: HashMap::new(),
            accumulator: Value::Null,
            counter: 0.0,
            cache: vec![],
            node_execution_count: 1,
            http_call_count: 0,
            config: Config::default_profile(),
        }
    }

    #[test]
    fn round_trips_through_json() {
        let snapshot = sample();
        let json = snapshot.to_json().unwrap();
        let restored = Snapshot::from_json(json).unwrap();
        assert_eq!(restored.execution_id, snapshot.execution_id);
        assert_eq!(restored.node_results, snapshot.node_results);
    }

    #[test]
    fn rejects_wrong_version() {
        let mut json = sample().to_json().unwrap();
        json["version"] = json!("0.9.0");
        assert!(matches!(Snapshot::from_json(json), Err(EngineError::Snapshot(_))));
    }
}
