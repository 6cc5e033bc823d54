use crate::{NodeExecutionState, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// Synchronous hooks invoked from inside the coordinator.
///
/// Callbacks run on the execution path and must return quickly.
pub trait ExecutionObserver: Send + Sync {
    fn on_node_state_change(&self, node_id: &str, state: &NodeExecutionState);

    /// Run progress, 0..=100
    fn on_progress(&self, _percent: u8) {}

    fn on_workflow_started(&self, _workflow_id: WorkflowId) {}

    fn on_workflow_completed(&self, _success: bool, _duration_ms: u64) {}
}

impl ExecutionObserver for Vec<Arc<dyn ExecutionObserver>> {
    fn on_node_state_change(&self, node_id: &str, state: &NodeExecutionState) {
        for observer in self {
            observer.on_node_state_change(node_id, state);
        }
    }

    fn on_progress(&self, percent: u8) {
        for observer in self {
            observer.on_progress(percent);
        }
    }

    fn on_workflow_started(&self, workflow_id: WorkflowId) {
        for observer in self {
            observer.on_workflow_started(workflow_id);
        }
    }

    fn on_workflow_completed(&self, success: bool, duration_ms: u64) {
        for observer in self {
            observer.on_workflow_completed(success, duration_ms);
        }
    }
}

/// Events emitted during workflow execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    WorkflowStarted {
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        timestamp: DateTime<Utc>,
    },
    NodeStateChanged {
        execution_id: ExecutionId,
        node_id: String,
        state: NodeExecutionState,
        timestamp: DateTime<Utc>,
    },
    Progress {
        execution_id: ExecutionId,
        percent: u8,
        timestamp: DateTime<Utc>,
    },
    WorkflowCompleted {
        execution_id: ExecutionId,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// Observer that forwards every hook of one execution onto the bus
#[derive(Clone)]
pub struct EventEmitter {
    execution_id: ExecutionId,
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventEmitter {
    pub fn new(execution_id: ExecutionId, sender: broadcast::Sender<ExecutionEvent>) -> Self {
        Self {
            execution_id,
            sender,
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    fn emit(&self, event: ExecutionEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }
}

impl ExecutionObserver for EventEmitter {
    fn on_node_state_change(&self, node_id: &str, state: &NodeExecutionState) {
        self.emit(ExecutionEvent::NodeStateChanged {
            execution_id: self.execution_id,
            node_id: node_id.to_string(),
            state: state.clone(),
            timestamp: Utc::now(),
        });
    }

    fn on_progress(&self, percent: u8) {
        self.emit(ExecutionEvent::Progress {
            execution_id: self.execution_id,
            percent,
            timestamp: Utc::now(),
        });
    }

    fn on_workflow_started(&self, workflow_id: WorkflowId) {
        self.emit(ExecutionEvent::WorkflowStarted {
            execution_id: self.execution_id,
            workflow_id,
            timestamp: Utc::now(),
        });
    }

    fn on_workflow_completed(&self, success: bool, duration_ms: u64) {
        self.emit(ExecutionEvent::WorkflowCompleted {
            execution_id: self.execution_id,
            success,
            duration_ms,
            timestamp: Utc::now(),
        });
    }
}

/// Global event bus
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    /// A capacity of zero is raised to one; broadcast channels need room
    /// for at least one event.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn create_emitter(&self, execution_id: ExecutionId) -> EventEmitter {
        EventEmitter::new(execution_id, self.sender.clone())
    }
}
