//! Workflow coordinators.
//!
//! Three strategies share the same building blocks: a pre-flight check of
//! the graph, catalog lookup, input resolution and node invocation, and the
//! assembly of a [`WorkflowResult`] from the state store.

mod parallel;
mod scoped;
mod sequential;

use crate::analyzer::GraphAnalyzer;
use crate::registry::{NodeCatalog, NodeCatalogEntry};
use crate::store::ExecutionStateStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use studiocore::{
    codes, ExecutionId, NodeContext, NodeError, NodeExecutionState, NodeInstance, NodeOutput,
    NodeStatePatch, Value, WorkflowError, WorkflowGraph,
};

/// How a full-graph run is scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// One node at a time in topological order
    Sequential,
    /// Whole dependency levels run concurrently
    #[default]
    LevelParallel,
}

/// First fatal error of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    pub node_id: Option<String>,
    pub message: String,
    pub code: String,
}

impl ExecutionFailure {
    pub fn from_node(node_id: &str, error: &NodeError) -> Self {
        Self {
            node_id: Some(node_id.to_string()),
            message: error.message.clone(),
            code: error.code_or_default().to_string(),
        }
    }
}

impl From<&WorkflowError> for ExecutionFailure {
    fn from(error: &WorkflowError) -> Self {
        Self {
            node_id: error.node_id().map(str::to_string),
            message: error.to_string(),
            code: error.code().to_string(),
        }
    }
}

/// Result of workflow execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub execution_id: ExecutionId,
    pub success: bool,
    /// Outputs of completed exit nodes, keyed by node label
    pub outputs: HashMap<String, HashMap<String, Value>>,
    pub node_states: HashMap<String, NodeExecutionState>,
    pub error: Option<ExecutionFailure>,
    pub duration: Duration,
}

impl WorkflowResult {
    /// Nodes that ended in the error state, sorted
    pub fn failed_nodes(&self) -> Vec<&str> {
        let mut failed: Vec<&str> = self
            .node_states
            .iter()
            .filter(|(_, state)| state.is_error())
            .map(|(id, _)| id.as_str())
            .collect();
        failed.sort_unstable();
        failed
    }

    pub fn completed_nodes(&self) -> usize {
        self.node_states.values().filter(|s| s.is_completed()).count()
    }
}

struct RunClock {
    execution_id: ExecutionId,
    started: Instant,
}

/// Executes workflow graphs against a node catalog
pub struct WorkflowExecutor {
    catalog: Arc<NodeCatalog>,
}

impl WorkflowExecutor {
    pub fn new(catalog: Arc<NodeCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<NodeCatalog> {
        &self.catalog
    }

    /// Run the full graph with the given strategy
    pub async fn execute(
        &self,
        strategy: ExecutionStrategy,
        workflow: &WorkflowGraph,
        inputs: &HashMap<String, Value>,
        store: &mut ExecutionStateStore,
        execution_id: ExecutionId,
    ) -> WorkflowResult {
        match strategy {
            ExecutionStrategy::Sequential => {
                self.execute_sequential(workflow, inputs, store, execution_id)
                    .await
            }
            ExecutionStrategy::LevelParallel => {
                self.execute_level_parallel(workflow, inputs, store, execution_id)
                    .await
            }
        }
    }

    fn begin(
        &self,
        workflow: &WorkflowGraph,
        store: &ExecutionStateStore,
        execution_id: ExecutionId,
        mode: &str,
    ) -> RunClock {
        tracing::info!(
            %execution_id,
            workflow_id = %workflow.id,
            workflow = %workflow.name,
            nodes = workflow.nodes.len(),
            mode,
            "starting workflow execution"
        );
        if let Some(observer) = store.observer() {
            observer.on_workflow_started(workflow.id);
        }
        RunClock {
            execution_id,
            started: Instant::now(),
        }
    }

    fn finish(
        &self,
        workflow: &WorkflowGraph,
        store: &ExecutionStateStore,
        clock: RunClock,
        error: Option<ExecutionFailure>,
    ) -> WorkflowResult {
        let duration = clock.started.elapsed();
        let success = error.is_none();

        let mut outputs = HashMap::new();
        for exit_id in &workflow.exit_nodes {
            let (Some(instance), Some(state)) = (workflow.find_node(exit_id), store.get(exit_id))
            else {
                continue;
            };
            if state.is_completed() {
                outputs.insert(instance.label().to_string(), state.outputs.clone());
            }
        }

        match &error {
            None => tracing::info!(
                execution_id = %clock.execution_id,
                duration_ms = duration.as_millis() as u64,
                "workflow completed"
            ),
            Some(failure) => tracing::error!(
                execution_id = %clock.execution_id,
                node_id = ?failure.node_id,
                code = %failure.code,
                "workflow failed: {}",
                failure.message
            ),
        }
        if let Some(observer) = store.observer() {
            observer.on_workflow_completed(success, duration.as_millis() as u64);
        }

        WorkflowResult {
            execution_id: clock.execution_id,
            success,
            outputs,
            node_states: store.snapshot(),
            error,
            duration,
        }
    }

    /// Structural checks shared by every strategy
    fn preflight(&self, workflow: &WorkflowGraph) -> Result<GraphAnalyzer, WorkflowError> {
        let analyzer = GraphAnalyzer::new(workflow)?;
        for id in workflow.entry_nodes.iter().chain(&workflow.exit_nodes) {
            if !analyzer.contains(id) {
                return Err(WorkflowError::InstanceNotFound(id.clone()));
            }
        }
        Ok(analyzer)
    }

    fn instance<'w>(
        &self,
        workflow: &'w WorkflowGraph,
        node_id: &str,
    ) -> Result<&'w NodeInstance, WorkflowError> {
        workflow
            .find_node(node_id)
            .ok_or_else(|| WorkflowError::InstanceNotFound(node_id.to_string()))
    }

    /// Catalog entry of `instance`. A miss marks the node failed; the caller
    /// aborts the run.
    fn entry_for(
        &self,
        instance: &NodeInstance,
        store: &mut ExecutionStateStore,
    ) -> Result<&NodeCatalogEntry, WorkflowError> {
        match self.catalog.get(&instance.node_type) {
            Some(entry) => Ok(entry),
            None => {
                let err = WorkflowError::NodeNotFound {
                    instance: instance.id.clone(),
                    node_type: instance.node_type.clone(),
                };
                store.update(
                    &instance.id,
                    NodeStatePatch::failed(NodeError::with_code(err.to_string(), err.code())),
                );
                Err(err)
            }
        }
    }
}

fn node_context(
    instance: &NodeInstance,
    workflow: &WorkflowGraph,
    inputs: HashMap<String, Value>,
) -> NodeContext {
    NodeContext {
        node_id: instance.id.clone(),
        inputs,
        config: instance.config.clone(),
        variables: workflow.variables.clone(),
    }
}

/// Run one `execute` call on its own task so a panic becomes a node error
async fn invoke(entry: &NodeCatalogEntry, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
    let node_id = ctx.node_id.clone();
    let node = Arc::clone(&entry.executor);
    let started = Instant::now();

    let result = match tokio::spawn(async move { node.execute(ctx).await }).await {
        Ok(result) => result,
        Err(join_err) => Err(NodeError::with_code(
            format!("node execution aborted: {}", join_err),
            codes::EXECUTION_ERROR,
        )),
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => tracing::debug!(%node_id, elapsed_ms, "node completed"),
        Err(err) => tracing::warn!(%node_id, elapsed_ms, code = err.code_or_default(), "node failed: {}", err.message),
    }
    result
}

/// Record the outcome of one node; returns the error for the caller to act on
fn commit(
    store: &mut ExecutionStateStore,
    node_id: &str,
    result: Result<NodeOutput, NodeError>,
) -> Option<NodeError> {
    match result {
        Ok(output) => {
            store.update(node_id, NodeStatePatch::completed(output.outputs));
            None
        }
        Err(err) => {
            store.update(node_id, NodeStatePatch::failed(err.clone()));
            Some(err)
        }
    }
}
