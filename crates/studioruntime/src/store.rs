use std::collections::HashMap;
use std::sync::Arc;
use studiocore::{ExecutionObserver, NodeExecutionState, NodeStatePatch};

/// Per-instance execution state of a run.
///
/// Owned by the coordinator, which is its only writer. Every mutation goes
/// through [`ExecutionStateStore::update`] so observers see one consistent
/// stream of transitions.
#[derive(Default)]
pub struct ExecutionStateStore {
    states: HashMap<String, NodeExecutionState>,
    observer: Option<Arc<dyn ExecutionObserver>>,
}

impl ExecutionStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with the states of an earlier run
    pub fn from_snapshot(states: HashMap<String, NodeExecutionState>) -> Self {
        Self {
            states,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn set_observer(&mut self, observer: Option<Arc<dyn ExecutionObserver>>) {
        self.observer = observer;
    }

    pub fn observer(&self) -> Option<&Arc<dyn ExecutionObserver>> {
        self.observer.as_ref()
    }

    /// Merge `patch` into the state of `node_id` (pending if unseen) and
    /// notify the observer with the result.
    pub fn update(&mut self, node_id: &str, patch: NodeStatePatch) {
        let state = self.states.entry(node_id.to_string()).or_default();
        state.apply(patch);
        tracing::trace!(node_id, status = ?state.status, "node state updated");
        if let Some(observer) = &self.observer {
            observer.on_node_state_change(node_id, state);
        }
    }

    /// Reset the given instances to pending
    pub fn initialize_pending<'a>(&mut self, node_ids: impl IntoIterator<Item = &'a str>) {
        for id in node_ids {
            self.update(id, NodeStatePatch::pending());
        }
    }

    pub fn get(&self, node_id: &str) -> Option<&NodeExecutionState> {
        self.states.get(node_id)
    }

    pub fn is_completed(&self, node_id: &str) -> bool {
        self.states.get(node_id).is_some_and(|s| s.is_completed())
    }

    /// Copy of every state; later updates do not affect it
    pub fn snapshot(&self) -> HashMap<String, NodeExecutionState> {
        self.states.clone()
    }

    pub(crate) fn report_progress(&self, processed: usize, total: usize) {
        let percent = progress_percent(processed, total);
        tracing::debug!(processed, total, percent, "progress");
        if let Some(observer) = &self.observer {
            observer.on_progress(percent);
        }
    }
}

/// `round(processed / total * 100)`, 100 for an empty run
pub(crate) fn progress_percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((processed as f64 / total as f64) * 100.0).round().min(100.0) as u8
}
