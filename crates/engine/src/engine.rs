//! The `Engine` orchestrator: ingest, kind inference, topological dispatch,
//! conditional-edge gating, resource counters, snapshot/restore.
//!
//! `Engine` implements both `nodes::ExecutionContext` (the capability
//! handle executors see) and `crate::expr::EvalContext` (what the
//! evaluator resolves `node.`/`variables.`/`context.` roots against) —
//! the cyclic-state-access inversion called for by the node crate's own
//! module docs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{info, instrument, warn};

use nodes::{Config, ExecutableNode, ExecutionContext, Node, NodeError, Registry};

use crate::error::EngineError;
use crate::expr::{self, EvalContext};
use crate::graph::Graph;
use crate::models::{Edge, ExecutionRecord, Payload};
use crate::observer::{Event, ObserverManager};
use crate::snapshot::{Snapshot, SNAPSHOT_VERSION};
use crate::state::StateManager;

/// Infers a missing node `kind` from the shape of its `data`, per spec's
/// fixed decision tree. Checks run in this exact order — a node carrying
/// fields for more than one rule (e.g. both `fallbackValue` and `timeout`
/// + `timeoutAction`) resolves to whichever rule is listed first, even
/// when that produces a surprising classification. This is taken verbatim
/// from the legacy ordering rather than reordered for a "better" result;
/// see DESIGN.md.
pub fn infer_kind(data: &Value) -> Option<&'static str> {
    let has = |key: &str| data.get(key).is_some();
    if has("value") {
        return Some("number");
    }
    if has("text") {
        return Some("text_input");
    }
    if has("op") {
        return Some("operation");
    }
    if has("url") {
        return Some("http");
    }
    if has("condition") {
        return Some("condition");
    }
    if has("varName") && has("varOp") {
        return Some("variable");
    }
    if has("cases") {
        return Some("switch");
    }
    if has("duration") {
        return Some("delay");
    }
    if has("maxAttempts") || has("backoffStrategy") {
        return Some("retry");
    }
    if has("fallbackValue") || has("continueOnError") {
        return Some("try_catch");
    }
    if has("timeout") && has("timeoutAction") {
        return Some("timeout");
    }
    if has("name") && has("value") {
        return Some("context_variable");
    }
    None
}

fn generate_execution_id() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 8];
    match rand::rngs::OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => bytes.iter().map(|b| format!("{b:02x}")).collect(),
        Err(e) => {
            warn!("CSPRNG unavailable ({e}), falling back to a timestamp-derived execution id");
            format!("{:016x}", Utc::now().timestamp_millis() as u64)
        }
    }
}

/// String length / array length / nesting depth ceilings from `Config`,
/// checked against a single value. Returns the violated-limit message, if
/// any.
fn validate_value(config: &Config, value: &Value) -> Option<String> {
    if let Value::String(s) = value {
        let len = s.chars().count();
        if config.max_string_length != 0 && len > config.max_string_length {
            return Some(format!("string length {len} exceeds max_string_length {}", config.max_string_length));
        }
    }
    if let Value::Array(items) = value {
        if config.max_array_length != 0 && items.len() > config.max_array_length {
            return Some(format!("array length {} exceeds max_array_length {}", items.len(), config.max_array_length));
        }
    }
    if config.max_context_depth != 0 {
        let depth = json_depth(value);
        if depth > config.max_context_depth {
            return Some(format!("nesting depth {depth} exceeds max_context_depth {}", config.max_context_depth));
        }
    }
    None
}

fn json_depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(json_depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(json_depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// True if the source's recorded result satisfies a conditional edge
/// labelled `label`. Covers both condition-node results (`path` field, or
/// the `condition_met` boolean for the `"true"`/`"false"` labels) and
/// switch-node results (`output_path` field).
fn edge_satisfied(label: &str, result: &Value) -> bool {
    if let Some(output_path) = result.get("output_path").and_then(Value::as_str) {
        if output_path == label {
            return true;
        }
    }
    if let Some(path) = result.get("path").and_then(Value::as_str) {
        if path == label {
            return true;
        }
    }
    match label {
        "true" => result.get("condition_met").and_then(Value::as_bool) == Some(true),
        "false" => result.get("condition_met").and_then(Value::as_bool) == Some(false),
        _ => false,
    }
}

/// Orchestrates exactly one workflow execution. `execute` takes `&mut
/// self` — deliberately tighter than the teacher's `&self`-based
/// `WorkflowExecutor::run` — to make the "one engine, one execution" rule
/// from spec.md §5 a compile-time property rather than a documented
/// convention; see DESIGN.md.
pub struct Engine {
    graph: Graph,
    order: Vec<String>,
    state: StateManager,
    registry: Arc<Registry>,
    config: Config,
    observers: ObserverManager,
    workflow_id: String,
    execution_id: String,
    node_results: RwLock<HashMap<String, Value>>,
    completed_order: RwLock<Vec<String>>,
    errors: RwLock<Vec<String>>,
    node_execution_count: AtomicU64,
    http_call_count: AtomicU64,
    cancelled: AtomicBool,
}

impl Engine {
    /// Parses nodes/edges, infers missing kinds, validates payload-size
    /// ceilings, and builds the graph. Graph cycles and unresolved edge
    /// endpoints are fatal here, at construction, matching spec.md §7.
    pub fn new(payload: Payload, config: Config, registry: Arc<Registry>, observers: ObserverManager) -> Result<Self, EngineError> {
        if config.max_nodes != 0 && payload.nodes.len() > config.max_nodes {
            return Err(EngineError::Validation(format!("node count {} exceeds max_nodes {}", payload.nodes.len(), config.max_nodes)));
        }
        if config.max_edges != 0 && payload.edges.len() > config.max_edges {
            return Err(EngineError::Validation(format!("edge count {} exceeds max_edges {}", payload.edges.len(), config.max_edges)));
        }

        let nodes = payload
            .nodes
            .into_iter()
            .map(|raw| {
                let kind = match raw.kind.filter(|k| !k.is_empty()) {
                    Some(kind) => kind,
                    None => infer_kind(&raw.data)
                        .ok_or_else(|| EngineError::Payload(format!("node '{}' has no 'type' and none could be inferred from its data", raw.id)))?
                        .to_string(),
                };
                Ok(Node { id: raw.id, kind, data: raw.data })
            })
            .collect::<Result<Vec<Node>, EngineError>>()?;

        let graph = Graph::build(&nodes, &payload.edges)?;
        let order = graph.topological_sort()?;

        Ok(Self {
            graph,
            order,
            state: StateManager::new(),
            registry,
            config,
            observers,
            workflow_id: payload.workflow_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            execution_id: generate_execution_id(),
            node_results: RwLock::new(HashMap::new()),
            completed_order: RwLock::new(Vec::new()),
            errors: RwLock::new(Vec::new()),
            node_execution_count: AtomicU64::new(0),
            http_call_count: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Rebuilds an engine from a snapshot's graph and state maps. Per
    /// spec.md §9 ("snapshot resume is not incremental"), this does not
    /// carry over `node_results` or the execution counters — `execute()`
    /// re-runs every node from a clean dispatch count, it does not skip
    /// nodes the snapshot already recorded.
    pub fn from_snapshot(snapshot: Snapshot, registry: Arc<Registry>, observers: ObserverManager) -> Result<Self, EngineError> {
        let graph = Graph::build(&snapshot.nodes, &snapshot.edges)?;
        let order = graph.topological_sort()?;
        let state = snapshot.restore_state();

        Ok(Self {
            graph,
            order,
            state,
            registry,
            config: snapshot.config,
            observers,
            workflow_id: snapshot.workflow_id,
            execution_id: generate_execution_id(),
            node_results: RwLock::new(HashMap::new()),
            completed_order: RwLock::new(Vec::new()),
            errors: RwLock::new(Vec::new()),
            node_execution_count: AtomicU64::new(0),
            http_call_count: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Captures a consistent snapshot of the current execution. Takes
    /// each lock just long enough to clone its contents; not a single
    /// global lock, but spec.md's "consistent read lock" requirement is
    /// satisfied because node results and counters only ever grow
    /// monotonically within an execution — a snapshot can at worst omit
    /// work that completes concurrently with the snapshot call, never see
    /// a half-written result.
    pub fn snapshot(&self) -> Snapshot {
        let nodes: Vec<Node> = self.graph.nodes().cloned().collect();
        let edges: Vec<Edge> = self.order.iter().flat_map(|id| self.graph.outgoing_edges(id).to_vec()).collect();
        let cache = self
            .state
            .cache_snapshot()
            .into_iter()
            .map(|(key, value, ttl)| crate::snapshot::CacheEntrySnapshot { key, value, remaining_ttl_ms: ttl.as_millis() as u64 })
            .collect();

        Snapshot {
            version: SNAPSHOT_VERSION.to_string(),
            created_at: Utc::now(),
            workflow_id: self.workflow_id.clone(),
            execution_id: self.execution_id.clone(),
            nodes,
            edges,
            node_results: self.node_results.read().clone(),
            completed_nodes: self.completed_order.read().clone(),
            errors: self.errors.read().clone(),
            variables: self.state.list_variables(),
            context_variables: self.state.list_context_variables(),
            context_constants: self.state.list_context_constants(),
            accumulator: self.state.get_accumulator(),
            counter: self.state.get_counter(),
            cache,
            node_execution_count: self.node_execution_count(),
            http_call_count: self.http_call_count(),
            config: self.config.clone(),
        }
    }

    pub fn node_execution_count(&self) -> u64 {
        self.node_execution_count.load(Ordering::SeqCst)
    }

    pub fn http_call_count(&self) -> u64 {
        self.http_call_count.load(Ordering::SeqCst)
    }

    /// Runs the workflow to completion (or to its first fatal error, or to
    /// the workflow timeout) and returns a well-formed `ExecutionRecord`
    /// regardless of outcome, per spec.md §7's "user-visible behavior".
    #[instrument(skip(self), fields(workflow_id = %self.workflow_id, execution_id = %self.execution_id))]
    pub async fn execute(&mut self) -> ExecutionRecord {
        info!("workflow execution starting ({} nodes)", self.order.len());
        self.observers.emit(Event::WorkflowStart { execution_id: self.execution_id.clone(), workflow_id: self.workflow_id.clone(), at: Utc::now() });

        let succeeded = tokio::select! {
            biased;
            _ = tokio::time::sleep(self.config.max_execution_time) => {
                self.cancelled.store(true, Ordering::SeqCst);
                warn!("workflow execution timed out after {:?}", self.config.max_execution_time);
                self.errors.write().push(format!("workflow execution timed out after {:?}", self.config.max_execution_time));
                false
            }
            result = self.run_all_nodes() => result,
        };

        info!(succeeded, "workflow execution finished");
        self.observers.emit(Event::WorkflowEnd { execution_id: self.execution_id.clone(), workflow_id: self.workflow_id.clone(), at: Utc::now(), succeeded });
        self.build_record()
    }

    async fn run_all_nodes(&self) -> bool {
        for node_id in self.order.clone() {
            if self.is_cancelled() {
                return false;
            }
            if !self.should_run(&node_id) {
                continue;
            }
            if !self.run_node(&node_id).await {
                return false;
            }
        }
        true
    }

    /// Conditional-edge gating (spec.md §4.5): a node with no incoming
    /// edges always runs; otherwise it runs iff at least one incoming
    /// edge's source executed, and either some incoming edge is
    /// unconditional or some conditional edge is satisfied.
    fn should_run(&self, node_id: &str) -> bool {
        let incoming = self.graph.incoming_edges(node_id);
        if incoming.is_empty() {
            return true;
        }
        let results = self.node_results.read();
        let mut any_source_ran = false;
        let mut unconditional_permits = false;
        let mut conditional_satisfied = false;
        for edge in incoming {
            let Some(result) = results.get(&edge.source) else { continue };
            any_source_ran = true;
            match edge.label() {
                None => unconditional_permits = true,
                Some(label) if edge_satisfied(label, result) => conditional_satisfied = true,
                Some(_) => {}
            }
        }
        any_source_ran && (unconditional_permits || conditional_satisfied)
    }

    async fn run_node(&self, node_id: &str) -> bool {
        let node = self.graph.node(node_id).expect("node id came from the graph's own order");
        let started = std::time::Instant::now();
        self.observers.emit(Event::NodeStart { node_id: node.id.clone(), kind: node.kind.clone(), at: Utc::now() });

        match self.dispatch_node(node).await {
            Ok(value) => {
                if let Some(message) = validate_value(&self.config, &value) {
                    warn!("node '{}' result violates a resource ceiling: {message}", node.id);
                }
                self.node_results.write().insert(node.id.clone(), value.clone());
                self.completed_order.write().push(node.id.clone());
                self.observers.emit(Event::NodeSuccess { node_id: node.id.clone(), kind: node.kind.clone(), elapsed: started.elapsed(), result: value });
                true
            }
            Err(err) => {
                let message = err.to_string();
                self.errors.write().push(message.clone());
                self.observers.emit(Event::NodeFailure { node_id: node.id.clone(), kind: node.kind.clone(), elapsed: started.elapsed(), error: message });
                false
            }
        }
    }

    /// Shared by top-level dispatch and `execute_body`: counts the
    /// dispatch, resolves the executor, interpolates template fields
    /// (skipped for context nodes, which exist to *define* context), and
    /// runs it. Counting happens here rather than only at the top level so
    /// `for_each`/`while_loop`/`retry`/etc. sub-iterations also count
    /// toward `max_node_executions`, per spec.md §4.4's "the engine
    /// increments the node-execution counter for each dispatch regardless".
    async fn dispatch_node(&self, node: &Node) -> Result<Value, NodeError> {
        self.increment_node_execution()?;

        let executor: Arc<dyn ExecutableNode> = self
            .registry
            .get(&node.kind)
            .ok_or_else(|| NodeError::fatal(node.id.clone(), format!("no executor registered for kind '{}'", node.kind)))?;
        executor.validate(node)?;

        let dispatched = if matches!(node.kind.as_str(), "context_variable" | "context_constant") {
            node.clone()
        } else {
            Node { id: node.id.clone(), kind: node.kind.clone(), data: self.interpolate_value(&node.data) }
        };

        executor.execute(self, &dispatched).await
    }

    fn interpolate_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.interpolate(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.interpolate_value(v)).collect()),
            Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), self.interpolate_value(v))).collect()),
            other => other.clone(),
        }
    }

    /// First terminal node in topological order whose kind is not a
    /// context kind; falls back to the first terminal node of any kind;
    /// `null` if no terminal node ran.
    fn compute_final_output(&self) -> Value {
        let results = self.node_results.read();
        let mut first_terminal: Option<Value> = None;
        for node_id in &self.order {
            if !self.graph.is_terminal(node_id) {
                continue;
            }
            let Some(result) = results.get(node_id) else { continue };
            if first_terminal.is_none() {
                first_terminal = Some(result.clone());
            }
            let kind = &self.graph.node(node_id).expect("node id came from the graph's own order").kind;
            if kind != "context_variable" && kind != "context_constant" {
                return result.clone();
            }
        }
        first_terminal.unwrap_or(Value::Null)
    }

    fn build_record(&self) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: self.execution_id.clone(),
            workflow_id: self.workflow_id.clone(),
            node_results: self.node_results.read().clone(),
            errors: self.errors.read().clone(),
            final_output: self.compute_final_output(),
        }
    }
}

#[async_trait]
impl ExecutionContext for Engine {
    fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    fn execution_id(&self) -> &str {
        &self.execution_id
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn inputs(&self, node_id: &str) -> Vec<Value> {
        let results = self.node_results.read();
        self.graph
            .incoming_edges(node_id)
            .into_iter()
            .filter_map(|edge| results.get(&edge.source).cloned())
            .collect()
    }

    fn get_variable(&self, name: &str) -> Option<Value> {
        self.state.get_variable(name)
    }

    fn set_variable(&self, name: &str, value: Value) -> Result<(), NodeError> {
        if self.config.max_variables != 0 && self.state.get_variable(name).is_none() && self.state.variable_count() >= self.config.max_variables {
            return Err(NodeError::fatal("<state>", format!("variable count exceeds max_variables {}", self.config.max_variables)));
        }
        if let Some(message) = validate_value(&self.config, &value) {
            return Err(NodeError::fatal("<state>", message));
        }
        self.state.set_variable(name, value);
        Ok(())
    }

    fn list_variables(&self) -> HashMap<String, Value> {
        self.state.list_variables()
    }

    fn get_context_variable(&self, name: &str) -> Option<Value> {
        self.state.get_context_variable(name)
    }

    /// Soft-validated: logs and stores anyway, preserving legacy behavior
    /// documented as an open question in spec.md §9 (see DESIGN.md).
    fn set_context_variable(&self, name: &str, value: Value) {
        if let Some(message) = validate_value(&self.config, &value) {
            warn!("context variable '{name}' violates a resource ceiling: {message}");
        }
        self.state.set_context_variable(name, value);
    }

    fn get_context_constant(&self, name: &str) -> Option<Value> {
        self.state.get_context_constant(name)
    }

    fn set_context_constant(&self, name: &str, value: Value) {
        if let Some(message) = validate_value(&self.config, &value) {
            warn!("context constant '{name}' violates a resource ceiling: {message}");
        }
        self.state.set_context_constant(name, value);
    }

    fn get_accumulator(&self) -> Value {
        self.state.get_accumulator()
    }

    fn set_accumulator(&self, value: Value) {
        self.state.set_accumulator(value);
    }

    fn get_counter(&self) -> f64 {
        self.state.get_counter()
    }

    fn set_counter(&self, value: f64) {
        self.state.set_counter(value);
    }

    fn increment_counter(&self, delta: f64) -> f64 {
        self.state.increment_counter(delta)
    }

    fn get_cache(&self, key: &str) -> Option<Value> {
        self.state.get_cache(key)
    }

    fn set_cache(&self, key: &str, value: Value, ttl: std::time::Duration) {
        self.state.set_cache(key, value, ttl);
    }

    fn evaluate_bool(&self, expr_text: &str, item: &Value) -> Result<bool, NodeError> {
        expr::evaluate_bool(expr_text, item, self).map_err(|e| NodeError::fatal("<expr>", e.to_string()))
    }

    fn evaluate_value(&self, expr_text: &str, item: &Value) -> Result<Value, NodeError> {
        expr::evaluate_value(expr_text, item, self).map_err(|e| NodeError::fatal("<expr>", e.to_string()))
    }

    fn interpolate(&self, template: &str) -> String {
        expr::interpolate(template, self)
    }

    fn increment_node_execution(&self) -> Result<u64, NodeError> {
        let current = self.node_execution_count.fetch_add(1, Ordering::SeqCst) + 1;
        if self.config.max_node_executions != 0 && current > self.config.max_node_executions {
            return Err(NodeError::fatal("<engine>", format!("maximum node executions exceeded ({current} > {})", self.config.max_node_executions)));
        }
        Ok(current)
    }

    fn increment_http_call(&self) -> Result<u64, NodeError> {
        let current = self.http_call_count.fetch_add(1, Ordering::SeqCst) + 1;
        if self.config.max_http_calls_per_exec != 0 && current > self.config.max_http_calls_per_exec {
            return Err(NodeError::fatal("<engine>", format!("maximum HTTP calls exceeded ({current} > {})", self.config.max_http_calls_per_exec)));
        }
        Ok(current)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn execute_body(&self, body: &Node) -> Result<Value, NodeError> {
        self.dispatch_node(body).await
    }
}

impl EvalContext for Engine {
    fn node_result(&self, node_id: &str) -> Option<Value> {
        self.node_results.read().get(node_id).cloned()
    }

    fn variable(&self, name: &str) -> Option<Value> {
        self.state.get_variable(name)
    }

    fn context(&self, name: &str) -> Option<Value> {
        self.state.get_context(name)
    }
}
