//! End-to-end tests driving `Engine` through whole payloads, covering the
//! seed scenarios and the universal invariants they were chosen to pin down.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use nodes::{Config, Registry};

use crate::engine::Engine;
use crate::models::{Edge, Payload, RawNode};
use crate::observer::ObserverManager;

fn registry() -> Arc<Registry> {
    let mut registry = Registry::new();
    nodes::register_builtins(&mut registry).expect("built-in registration never collides");
    Arc::new(registry)
}

fn node(id: &str, kind: &str, data: serde_json::Value) -> RawNode {
    RawNode { id: id.to_string(), kind: Some(kind.to_string()), data }
}

fn edge(source: &str, target: &str) -> Edge {
    Edge { source: source.to_string(), target: target.to_string(), source_handle: None, condition: None }
}

fn labeled_edge(source: &str, target: &str, label: &str) -> Edge {
    Edge { source: source.to_string(), target: target.to_string(), source_handle: Some(label.to_string()), condition: None }
}

fn payload(nodes: Vec<RawNode>, edges: Vec<Edge>) -> Payload {
    Payload { workflow_id: None, nodes, edges }
}

/// S1: `10 + 5` through two number literals and an add operation.
#[tokio::test]
async fn s1_simple_add() {
    let nodes = vec![
        node("n1", "number", json!({ "value": 10 })),
        node("n2", "number", json!({ "value": 5 })),
        node("n3", "operation", json!({ "op": "add" })),
    ];
    let edges = vec![edge("n1", "n3"), edge("n2", "n3")];

    let mut engine = Engine::new(payload(nodes, edges), Config::default_profile(), registry(), ObserverManager::noop()).unwrap();
    let record = engine.execute().await;

    assert!(record.errors.is_empty(), "unexpected errors: {:?}", record.errors);
    assert_eq!(record.node_results["n3"], json!(15.0));
    assert_eq!(record.final_output, json!(15.0));
}

/// S2: conditional branch — only the `true`-labelled branch runs.
#[tokio::test]
async fn s2_conditional_branch() {
    let nodes = vec![
        node("age", "number", json!({ "value": 21 })),
        node("check", "condition", json!({ "condition": "node.age >= 18" })),
        node("adult", "text_input", json!({ "text": "adult" })),
        node("minor", "text_input", json!({ "text": "minor" })),
    ];
    let edges = vec![edge("age", "check"), labeled_edge("check", "adult", "true"), labeled_edge("check", "minor", "false")];

    let mut engine = Engine::new(payload(nodes, edges), Config::default_profile(), registry(), ObserverManager::noop()).unwrap();
    let record = engine.execute().await;

    assert!(record.errors.is_empty(), "unexpected errors: {:?}", record.errors);
    assert!(record.node_results.contains_key("adult"));
    assert!(!record.node_results.contains_key("minor"));
}

/// S3: switch routing by HTTP-style status code — only the matching
/// downstream handler runs.
#[tokio::test]
async fn s3_switch_routing() {
    let nodes = vec![
        node("status", "number", json!({ "value": 200 })),
        node(
            "route",
            "switch",
            json!({ "cases": [
                { "when": "item == 200", "outputPath": "success" },
                { "when": "item >= 400", "outputPath": "failure" },
            ] }),
        ),
        node("success_handler", "text_input", json!({ "text": "ok" })),
        node("failure_handler", "text_input", json!({ "text": "err" })),
    ];
    let edges = vec![
        edge("status", "route"),
        labeled_edge("route", "success_handler", "success"),
        labeled_edge("route", "failure_handler", "failure"),
    ];

    let mut engine = Engine::new(payload(nodes, edges), Config::default_profile(), registry(), ObserverManager::noop()).unwrap();
    let record = engine.execute().await;

    assert!(record.errors.is_empty(), "unexpected errors: {:?}", record.errors);
    let route_result = &record.node_results["route"];
    assert_eq!(route_result["matched"], json!(true));
    assert_eq!(route_result["output_path"], json!("success"));
    assert!(record.node_results.contains_key("success_handler"));
    assert!(!record.node_results.contains_key("failure_handler"));
}

/// S4: range 1..10 filtered down to the even values. Uses the literal
/// `variables.item % 2 == 0` predicate form from the seed scenario —
/// `filter` sets `variables.item` per element for this purpose.
#[tokio::test]
async fn s4_filter_even_values() {
    let nodes = vec![
        node("source", "range", json!({ "start": 1, "end": 11 })),
        node("evens", "filter", json!({ "predicate": "variables.item % 2 == 0" })),
    ];
    let edges = vec![edge("source", "evens")];

    let mut engine = Engine::new(payload(nodes, edges), Config::default_profile(), registry(), ObserverManager::noop()).unwrap();
    let record = engine.execute().await;

    assert!(record.errors.is_empty(), "unexpected errors: {:?}", record.errors);
    assert_eq!(record.node_results["evens"], json!([2.0, 4.0, 6.0, 8.0, 10.0]));
}

/// S5: a 5-node linear chain with `max_node_executions = 3` stops after the
/// 4th dispatch, leaving the workflow incomplete and recording an error.
#[tokio::test]
async fn s5_node_execution_limit() {
    let nodes = vec![
        node("n1", "number", json!({ "value": 1 })),
        node("n2", "number", json!({ "value": 1 })),
        node("n3", "number", json!({ "value": 1 })),
        node("n4", "number", json!({ "value": 1 })),
        node("n5", "number", json!({ "value": 1 })),
    ];
    let edges = vec![edge("n1", "n2"), edge("n2", "n3"), edge("n3", "n4"), edge("n4", "n5")];

    let config = Config { max_node_executions: 3, ..Config::default_profile() };
    let mut engine = Engine::new(payload(nodes, edges), config, registry(), ObserverManager::noop()).unwrap();
    let record = engine.execute().await;

    assert_eq!(engine.node_execution_count(), 4);
    assert_eq!(record.errors.len(), 1);
    assert!(record.errors[0].contains("maximum node executions exceeded"), "{}", record.errors[0]);
    assert_eq!(record.node_results.len(), 3);
    assert!(!record.node_results.contains_key("n4"));
    assert!(!record.node_results.contains_key("n5"));
}

/// S6: snapshotting a finished execution and resuming from it re-executes
/// every node, producing identical results and dispatch counts.
#[tokio::test]
async fn s6_snapshot_round_trip() {
    let nodes = vec![
        node("n1", "number", json!({ "value": 10 })),
        node("n2", "number", json!({ "value": 5 })),
        node("n3", "operation", json!({ "op": "add" })),
    ];
    let edges = vec![edge("n1", "n3"), edge("n2", "n3")];

    let mut engine = Engine::new(payload(nodes, edges), Config::default_profile(), registry(), ObserverManager::noop()).unwrap();
    let first = engine.execute().await;
    assert!(first.errors.is_empty());

    let snapshot = engine.snapshot();
    let json = snapshot.to_json().unwrap();
    let restored_snapshot = crate::snapshot::Snapshot::from_json(json).unwrap();

    let mut resumed = Engine::from_snapshot(restored_snapshot, registry(), ObserverManager::noop()).unwrap();
    let second = resumed.execute().await;

    assert!(second.errors.is_empty(), "unexpected errors: {:?}", second.errors);
    assert_eq!(second.node_results["n1"], first.node_results["n1"]);
    assert_eq!(second.node_results["n2"], first.node_results["n2"]);
    assert_eq!(second.node_results["n3"], first.node_results["n3"]);
    assert_eq!(resumed.node_execution_count(), engine.node_execution_count());
}

/// A node with no `type` field infers `number` from `value`, per the
/// kind-inference decision tree.
#[tokio::test]
async fn infers_missing_kind_from_data_shape() {
    let nodes = vec![RawNode { id: "n1".to_string(), kind: None, data: json!({ "value": 42 }) }];
    let mut engine = Engine::new(payload(nodes, vec![]), Config::default_profile(), registry(), ObserverManager::noop()).unwrap();
    let record = engine.execute().await;

    assert!(record.errors.is_empty());
    assert_eq!(record.node_results["n1"], json!(42.0));
}

/// A workflow whose total time exceeds `max_execution_time` is cancelled
/// cooperatively rather than left to run forever.
#[tokio::test]
async fn workflow_timeout_aborts_execution() {
    let nodes = vec![node("n1", "delay", json!({ "duration": 5_000 }))];
    let config = Config { max_execution_time: Duration::from_millis(20), ..Config::default_profile() };
    let mut engine = Engine::new(payload(nodes, vec![]), config, registry(), ObserverManager::noop()).unwrap();
    let record = engine.execute().await;

    assert!(record.errors.iter().any(|e| e.contains("timed out")), "{:?}", record.errors);
    assert!(!record.node_results.contains_key("n1"));
}
