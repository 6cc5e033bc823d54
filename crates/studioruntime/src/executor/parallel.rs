use super::{commit, invoke, node_context, ExecutionFailure, WorkflowExecutor, WorkflowResult};
use crate::resolver::resolve_inputs;
use crate::store::ExecutionStateStore;
use futures::future::join_all;
use std::collections::HashMap;
use studiocore::{ExecutionId, NodeId, NodeStatePatch, Value, WorkflowError, WorkflowGraph};

impl WorkflowExecutor {
    /// Execute the graph level by level.
    ///
    /// All nodes whose predecessors have settled are fired together and the
    /// whole level is awaited before anything downstream starts. A failure
    /// does not cancel its siblings; it aborts the run once the level has
    /// settled unless `continue_on_error` is set.
    pub async fn execute_level_parallel(
        &self,
        workflow: &WorkflowGraph,
        inputs: &HashMap<String, Value>,
        store: &mut ExecutionStateStore,
        execution_id: ExecutionId,
    ) -> WorkflowResult {
        let clock = self.begin(workflow, store, execution_id, "level_parallel");
        let failure = self.run_levels(workflow, inputs, store).await.err();
        self.finish(workflow, store, clock, failure)
    }

    async fn run_levels(
        &self,
        workflow: &WorkflowGraph,
        inputs: &HashMap<String, Value>,
        store: &mut ExecutionStateStore,
    ) -> Result<(), ExecutionFailure> {
        let fatal = |e: WorkflowError| ExecutionFailure::from(&e);

        let analyzer = self.preflight(workflow).map_err(fatal)?;
        analyzer.detect_cycle().map_err(fatal)?;

        store.initialize_pending(workflow.nodes.iter().map(|n| n.id.as_str()));
        let mut scheduler = LevelScheduler::new(workflow, analyzer.indegrees());
        let total = workflow.nodes.len();
        let mut processed = 0;
        let mut level_no = 0;

        while processed < total {
            let level = scheduler.next_level().map_err(fatal)?;
            level_no += 1;
            tracing::debug!(level = level_no, nodes = ?level, "firing level");

            // Resolve every catalog entry first so a missing type aborts
            // before any sibling is marked running.
            let mut entries = Vec::with_capacity(level.len());
            for node_id in &level {
                let instance = self.instance(workflow, node_id).map_err(fatal)?;
                let entry = self.entry_for(instance, store).map_err(fatal)?;
                entries.push((instance, entry));
            }

            let mut pending = Vec::with_capacity(level.len());
            for (node_id, (instance, entry)) in level.iter().zip(&entries) {
                store.update(node_id, NodeStatePatch::running());
                let resolved = resolve_inputs(instance, entry, workflow, store, inputs);
                pending.push(invoke(entry, node_context(instance, workflow, resolved)));
            }
            let results = join_all(pending).await;

            // Commit the whole level before deciding, so every sibling's
            // state is kept for diagnostics.
            let mut first_failure = None;
            for (node_id, result) in level.iter().zip(results) {
                if let Some(err) = commit(store, node_id, result) {
                    first_failure.get_or_insert_with(|| ExecutionFailure::from_node(node_id, &err));
                }
            }
            processed += level.len();
            store.report_progress(processed, total);

            if let Some(failure) = first_failure {
                if !workflow.continue_on_error {
                    return Err(failure);
                }
                tracing::warn!(level = level_no, "continuing after node failure");
            }

            for node_id in &level {
                scheduler.release(analyzer.successors(node_id));
            }
        }

        Ok(())
    }
}

/// Outstanding dependency counts of a level-parallel run.
///
/// After a successful cycle check every node eventually becomes ready, so
/// `Deadlock` only surfaces if the counts and the graph disagree.
struct LevelScheduler<'w> {
    workflow: &'w WorkflowGraph,
    declared: HashMap<&'w str, usize>,
    indegree: HashMap<NodeId, usize>,
    ready: Vec<NodeId>,
}

impl<'w> LevelScheduler<'w> {
    fn new(workflow: &'w WorkflowGraph, indegree: HashMap<NodeId, usize>) -> Self {
        let declared = workflow
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();
        let ready = workflow
            .nodes
            .iter()
            .filter(|n| indegree.get(&n.id) == Some(&0))
            .map(|n| n.id.clone())
            .collect();
        Self {
            workflow,
            declared,
            indegree,
            ready,
        }
    }

    /// Take every ready node, in declaration order
    fn next_level(&mut self) -> Result<Vec<NodeId>, WorkflowError> {
        if self.ready.is_empty() {
            let remaining = self
                .workflow
                .nodes
                .iter()
                .filter(|n| self.indegree.get(&n.id).is_some_and(|d| *d > 0))
                .map(|n| n.id.clone())
                .collect();
            return Err(WorkflowError::Deadlock { remaining });
        }
        Ok(std::mem::take(&mut self.ready))
    }

    /// A settled node releases one dependency of each successor
    fn release<'a>(&mut self, successors: impl IntoIterator<Item = &'a str>) {
        for succ in successors {
            if let Some(degree) = self.indegree.get_mut(succ) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    self.ready.push(succ.to_string());
                }
            }
        }
        let declared = &self.declared;
        self.ready
            .sort_by_key(|id| declared.get(id.as_str()).copied().unwrap_or(usize::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studiocore::WorkflowBuilder;

    fn pair() -> WorkflowGraph {
        WorkflowBuilder::new("pair")
            .add_node("a", "noop")
            .add_node("b", "noop")
            .add_node("c", "noop")
            .build()
    }

    #[test]
    fn released_nodes_come_out_in_declaration_order() {
        let wf = pair();
        let indegree = HashMap::from([("a".to_string(), 0), ("b".into(), 1), ("c".into(), 1)]);
        let mut scheduler = LevelScheduler::new(&wf, indegree);

        assert_eq!(scheduler.next_level().unwrap(), vec!["a"]);
        scheduler.release(["c", "b"]);
        assert_eq!(scheduler.next_level().unwrap(), vec!["b", "c"]);
    }

    #[test]
    fn unsatisfiable_counts_report_deadlock() {
        let wf = pair();
        // `c` waits on a dependency nothing will ever release
        let indegree = HashMap::from([("a".to_string(), 0), ("b".into(), 1), ("c".into(), 2)]);
        let mut scheduler = LevelScheduler::new(&wf, indegree);

        assert_eq!(scheduler.next_level().unwrap(), vec!["a"]);
        scheduler.release(["b", "c"]);
        assert_eq!(scheduler.next_level().unwrap(), vec!["b"]);
        scheduler.release(std::iter::empty());
        assert_eq!(
            scheduler.next_level(),
            Err(WorkflowError::Deadlock {
                remaining: vec!["c".into()]
            })
        );
    }
}
