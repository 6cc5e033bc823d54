use super::{commit, invoke, node_context, ExecutionFailure, WorkflowExecutor, WorkflowResult};
use crate::resolver::resolve_inputs;
use crate::store::ExecutionStateStore;
use std::collections::HashMap;
use studiocore::{ExecutionId, NodeStatePatch, Value, WorkflowError, WorkflowGraph};

impl WorkflowExecutor {
    /// Execute every node in topological order, one at a time.
    ///
    /// A node error aborts the run unless `continue_on_error` is set;
    /// structural errors always abort.
    pub async fn execute_sequential(
        &self,
        workflow: &WorkflowGraph,
        inputs: &HashMap<String, Value>,
        store: &mut ExecutionStateStore,
        execution_id: ExecutionId,
    ) -> WorkflowResult {
        let clock = self.begin(workflow, store, execution_id, "sequential");
        let failure = self.run_sequential(workflow, inputs, store).await.err();
        self.finish(workflow, store, clock, failure)
    }

    async fn run_sequential(
        &self,
        workflow: &WorkflowGraph,
        inputs: &HashMap<String, Value>,
        store: &mut ExecutionStateStore,
    ) -> Result<(), ExecutionFailure> {
        let order = self
            .plan_sequential(workflow)
            .map_err(|e| ExecutionFailure::from(&e))?;
        store.initialize_pending(order.iter().map(String::as_str));
        let total = order.len();

        for (position, node_id) in order.iter().enumerate() {
            let instance = self
                .instance(workflow, node_id)
                .map_err(|e| ExecutionFailure::from(&e))?;

            store.update(node_id, NodeStatePatch::running());
            let entry = self
                .entry_for(instance, store)
                .map_err(|e| ExecutionFailure::from(&e))?;
            let resolved = resolve_inputs(instance, entry, workflow, store, inputs);

            let result = invoke(entry, node_context(instance, workflow, resolved)).await;
            if let Some(err) = commit(store, node_id, result) {
                if !workflow.continue_on_error {
                    return Err(ExecutionFailure::from_node(node_id, &err));
                }
                tracing::warn!(%node_id, "continuing after node failure");
            }

            store.report_progress(position + 1, total);
        }

        Ok(())
    }

    fn plan_sequential(&self, workflow: &WorkflowGraph) -> Result<Vec<String>, WorkflowError> {
        let analyzer = self.preflight(workflow)?;
        analyzer.detect_cycle()?;
        analyzer.topological_order()
    }
}
