//! Observer notification: `workflow_start`/`workflow_end`/`node_start`/
//! `node_success`/`node_failure` events, dispatched off the main loop so a
//! slow or misbehaving observer never back-pressures node execution.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// An event emitted by the engine over the lifetime of one execution.
#[derive(Debug, Clone)]
pub enum Event {
    WorkflowStart { execution_id: String, workflow_id: String, at: DateTime<Utc> },
    WorkflowEnd { execution_id: String, workflow_id: String, at: DateTime<Utc>, succeeded: bool },
    NodeStart { node_id: String, kind: String, at: DateTime<Utc> },
    NodeSuccess { node_id: String, kind: String, elapsed: Duration, result: Value },
    NodeFailure { node_id: String, kind: String, elapsed: Duration, error: String },
}

/// Receives lifecycle events. Implementations must not block — the engine
/// spawns each notification as a detached task and logs (never propagates)
/// any error an observer reports back.
pub trait Observer: Send + Sync {
    fn notify(&self, event: Event);
}

/// The default observer: does nothing. Used when no observer is supplied,
/// matching spec.md §6's "core uses a no-op logger if none is supplied"
/// framing applied to the Observer collaborator.
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn notify(&self, _event: Event) {}
}

/// Fans events out to every registered observer. Each `notify` call is
/// spawned on the tokio runtime so a slow observer cannot delay the next
/// node dispatch; observers are expected to return promptly regardless,
/// since `notify` itself is synchronous.
#[derive(Clone)]
pub struct ObserverManager {
    observers: Arc<Vec<Arc<dyn Observer>>>,
}

impl ObserverManager {
    pub fn new(observers: Vec<Arc<dyn Observer>>) -> Self {
        Self { observers: Arc::new(observers) }
    }

    pub fn noop() -> Self {
        Self::new(vec![Arc::new(NoopObserver)])
    }

    pub fn emit(&self, event: Event) {
        for observer in self.observers.iter().cloned() {
            let event = event.clone();
            tokio::spawn(async move {
                observer.notify(event);
            });
        }
    }
}
