use crate::{NodeError, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
}

/// Execution state of one node instance within a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeExecutionState {
    pub status: ExecutionStatus,
    #[serde(default)]
    pub outputs: HashMap<String, Value>,
    #[serde(default)]
    pub error: Option<NodeError>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl NodeExecutionState {
    pub fn is_completed(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }

    pub fn is_error(&self) -> bool {
        self.status == ExecutionStatus::Error
    }

    /// Merge a patch; fields absent from the patch are kept
    pub fn apply(&mut self, patch: NodeStatePatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(outputs) = patch.outputs {
            self.outputs = outputs;
        }
        if let Some(error) = patch.error {
            self.error = error;
        }
        if let Some(started_at) = patch.started_at {
            self.started_at = Some(started_at);
        }
        if let Some(completed_at) = patch.completed_at {
            self.completed_at = Some(completed_at);
        }
    }
}

/// Partial update to a [`NodeExecutionState`]
#[derive(Debug, Clone, Default)]
pub struct NodeStatePatch {
    pub status: Option<ExecutionStatus>,
    pub outputs: Option<HashMap<String, Value>>,
    /// `Some(None)` clears a previous error
    pub error: Option<Option<NodeError>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl NodeStatePatch {
    pub fn pending() -> Self {
        Self {
            status: Some(ExecutionStatus::Pending),
            outputs: Some(HashMap::new()),
            error: Some(None),
            ..Self::default()
        }
    }

    pub fn running() -> Self {
        Self {
            status: Some(ExecutionStatus::Running),
            error: Some(None),
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn completed(outputs: HashMap<String, Value>) -> Self {
        Self {
            status: Some(ExecutionStatus::Completed),
            outputs: Some(outputs),
            error: Some(None),
            completed_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn failed(error: NodeError) -> Self {
        Self {
            status: Some(ExecutionStatus::Error),
            outputs: Some(HashMap::new()),
            error: Some(Some(error)),
            completed_at: Some(Utc::now()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_keeps_untouched_fields() {
        let mut state = NodeExecutionState::default();
        state.apply(NodeStatePatch::running());
        let started = state.started_at;
        assert!(started.is_some());

        let outputs = HashMap::from([("text".to_string(), Value::Text("ok".into()))]);
        state.apply(NodeStatePatch::completed(outputs.clone()));
        assert_eq!(state.status, ExecutionStatus::Completed);
        assert_eq!(state.started_at, started);
        assert_eq!(state.outputs, outputs);
    }

    #[test]
    fn failure_clears_stale_outputs() {
        let mut state = NodeExecutionState::default();
        state.apply(NodeStatePatch::completed(HashMap::from([(
            "text".to_string(),
            Value::Text("old".into()),
        )])));
        state.apply(NodeStatePatch::failed(NodeError::new("boom")));
        assert!(state.is_error());
        assert!(state.outputs.is_empty());
        assert_eq!(state.error.as_ref().map(|e| e.message.as_str()), Some("boom"));
    }
}
