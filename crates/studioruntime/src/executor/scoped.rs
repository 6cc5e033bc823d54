use super::{commit, invoke, node_context, ExecutionFailure, WorkflowExecutor, WorkflowResult};
use crate::resolver::resolve_inputs;
use crate::store::ExecutionStateStore;
use std::collections::HashMap;
use studiocore::{codes, ExecutionId, NodeError, NodeStatePatch, WorkflowGraph};

impl WorkflowExecutor {
    /// Re-run `target` and everything causally connected to it.
    ///
    /// Ancestors that already completed in `store` are reused without being
    /// executed. The target and its descendants always run, sequentially.
    /// A failure marks every dependent in the slice as skipped but does not
    /// stop independent nodes.
    pub async fn execute_scoped(
        &self,
        workflow: &WorkflowGraph,
        target: &str,
        store: &mut ExecutionStateStore,
        execution_id: ExecutionId,
    ) -> WorkflowResult {
        let clock = self.begin(workflow, store, execution_id, "scoped");
        let failure = self.run_scoped(workflow, target, store).await.err();
        self.finish(workflow, store, clock, failure)
    }

    async fn run_scoped(
        &self,
        workflow: &WorkflowGraph,
        target: &str,
        store: &mut ExecutionStateStore,
    ) -> Result<(), ExecutionFailure> {
        let analyzer = self
            .preflight(workflow)
            .map_err(|e| ExecutionFailure::from(&e))?;
        let plan = analyzer
            .scoped_execution_order(target)
            .map_err(|e| ExecutionFailure::from(&e))?;
        tracing::debug!(%target, order = ?plan.order, "scoped execution plan");

        let no_injected = HashMap::new();
        let total = plan.order.len();
        // failed node -> node whose failure caused it
        let mut failed: HashMap<&str, String> = HashMap::new();
        let mut first_failure = None;

        for (position, node_id) in plan.order.iter().enumerate() {
            let stale = node_id == target || plan.downstream.contains(node_id);

            let upstream_failure = analyzer
                .predecessors(node_id)
                .into_iter()
                .find_map(|pred| failed.get(pred).cloned());
            if let Some(root) = upstream_failure {
                tracing::debug!(%node_id, %root, "skipping, upstream failed");
                store.update(
                    node_id,
                    NodeStatePatch::failed(NodeError::with_code(
                        format!("skipped: upstream node '{}' failed", root),
                        codes::UPSTREAM_FAILED,
                    )),
                );
                failed.insert(node_id, root);
                store.report_progress(position + 1, total);
                continue;
            }

            if !stale && store.is_completed(node_id) {
                tracing::debug!(%node_id, "reusing cached outputs");
                store.report_progress(position + 1, total);
                continue;
            }

            let instance = self
                .instance(workflow, node_id)
                .map_err(|e| ExecutionFailure::from(&e))?;
            store.update(node_id, NodeStatePatch::running());
            let entry = self
                .entry_for(instance, store)
                .map_err(|e| ExecutionFailure::from(&e))?;
            let resolved = resolve_inputs(instance, entry, workflow, store, &no_injected);

            let result = invoke(entry, node_context(instance, workflow, resolved)).await;
            if let Some(err) = commit(store, node_id, result) {
                first_failure.get_or_insert_with(|| ExecutionFailure::from_node(node_id, &err));
                failed.insert(node_id, node_id.clone());
            }
            store.report_progress(position + 1, total);
        }

        match first_failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}
