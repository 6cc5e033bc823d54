use crate::analyzer::GraphAnalyzer;
use crate::executor::{ExecutionStrategy, WorkflowExecutor, WorkflowResult};
use crate::registry::NodeCatalog;
use crate::store::ExecutionStateStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use studiocore::{
    EventBus, ExecutionEvent, ExecutionId, ExecutionObserver, FlowError, Value, WorkflowError,
    WorkflowGraph, WorkflowId,
};
use tokio::sync::RwLock;

/// Main runtime for executing workflows
pub struct StudioRuntime {
    catalog: Arc<NodeCatalog>,
    executor: WorkflowExecutor,
    event_bus: Arc<EventBus>,
    config: RuntimeConfig,
    workflows: Arc<RwLock<HashMap<WorkflowId, WorkflowGraph>>>,
}

impl StudioRuntime {
    /// Create a runtime over a pre-populated catalog
    pub fn new(catalog: Arc<NodeCatalog>) -> Self {
        Self::with_config(catalog, RuntimeConfig::default())
    }

    pub fn with_config(catalog: Arc<NodeCatalog>, config: RuntimeConfig) -> Self {
        let executor = WorkflowExecutor::new(Arc::clone(&catalog));
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        Self {
            catalog,
            executor,
            event_bus,
            config,
            workflows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn catalog(&self) -> &Arc<NodeCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Register a workflow
    pub async fn register_workflow(&self, workflow: WorkflowGraph) {
        let mut workflows = self.workflows.write().await;
        workflows.insert(workflow.id, workflow);
    }

    /// Execute a registered workflow by id
    pub async fn execute_workflow(
        &self,
        workflow_id: WorkflowId,
        inputs: HashMap<String, Value>,
    ) -> Result<WorkflowResult, FlowError> {
        let workflows = self.workflows.read().await;
        let workflow = workflows
            .get(&workflow_id)
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()))?;
        Ok(self.run(workflow, inputs).await)
    }

    /// Run the whole graph with the configured strategy
    pub async fn run(
        &self,
        workflow: &WorkflowGraph,
        inputs: HashMap<String, Value>,
    ) -> WorkflowResult {
        let mut store = ExecutionStateStore::new();
        self.run_with_store(workflow, inputs, &mut store).await
    }

    /// Run the whole graph, recording into a caller-owned store so a later
    /// scoped run can reuse the results
    pub async fn run_with_store(
        &self,
        workflow: &WorkflowGraph,
        inputs: HashMap<String, Value>,
        store: &mut ExecutionStateStore,
    ) -> WorkflowResult {
        let execution_id = ExecutionId::new_v4();
        let previous = self.attach_emitter(store, execution_id);
        let result = self
            .executor
            .execute(self.config.strategy, workflow, &inputs, store, execution_id)
            .await;
        store.set_observer(previous);
        result
    }

    /// Re-run `target` and its causal neighbourhood against `store`
    pub async fn run_scoped(
        &self,
        workflow: &WorkflowGraph,
        target: &str,
        store: &mut ExecutionStateStore,
    ) -> WorkflowResult {
        let execution_id = ExecutionId::new_v4();
        let previous = self.attach_emitter(store, execution_id);
        let result = self
            .executor
            .execute_scoped(workflow, target, store, execution_id)
            .await;
        store.set_observer(previous);
        result
    }

    /// Check a graph without running it: dangling references, cycles and
    /// unknown node types
    pub fn validate(&self, workflow: &WorkflowGraph) -> Result<(), WorkflowError> {
        let analyzer = GraphAnalyzer::new(workflow)?;
        analyzer.detect_cycle()?;
        for id in workflow.entry_nodes.iter().chain(&workflow.exit_nodes) {
            if !analyzer.contains(id) {
                return Err(WorkflowError::InstanceNotFound(id.clone()));
            }
        }
        for node in &workflow.nodes {
            if !self.catalog.has(&node.node_type) {
                return Err(WorkflowError::NodeNotFound {
                    instance: node.id.clone(),
                    node_type: node.node_type.clone(),
                });
            }
        }
        Ok(())
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Get the event bus for direct access
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Route the store's notifications to the bus as well as to whatever
    /// observer the caller installed. Returns the caller's observer.
    fn attach_emitter(
        &self,
        store: &mut ExecutionStateStore,
        execution_id: ExecutionId,
    ) -> Option<Arc<dyn ExecutionObserver>> {
        let previous = store.observer().cloned();
        let emitter: Arc<dyn ExecutionObserver> =
            Arc::new(self.event_bus.create_emitter(execution_id));
        let combined: Arc<dyn ExecutionObserver> = match &previous {
            Some(observer) => Arc::new(vec![Arc::clone(observer), emitter]),
            None => emitter,
        };
        store.set_observer(Some(combined));
        previous
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub strategy: ExecutionStrategy,
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            strategy: ExecutionStrategy::LevelParallel,
            event_buffer_size: 1000,
        }
    }
}

impl RuntimeConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.event_buffer_size == 0 {
            return Err(WorkflowError::Invalid(
                "event_buffer_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
