//! Structural analysis of workflow graphs: cycle detection, ordering and
//! the execution slice used by scoped re-runs.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};
use studiocore::{NodeId, WorkflowError, WorkflowGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// One level of an explicit depth-first walk
struct Frame {
    node: NodeIndex,
    neighbors: Vec<NodeIndex>,
    next: usize,
}

/// Execution slice for a scoped re-run
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedPlan {
    pub target: NodeId,
    /// Every node in the slice; each appears after all of its predecessors
    pub order: Vec<NodeId>,
    /// Transitive successors of the target
    pub downstream: HashSet<NodeId>,
}

/// Dependency graph of one workflow, indexed in node declaration order
pub struct GraphAnalyzer {
    graph: DiGraph<NodeId, ()>,
    index: HashMap<NodeId, NodeIndex>,
}

impl GraphAnalyzer {
    /// Build the dependency graph. Dangling connection endpoints are rejected.
    pub fn new(workflow: &WorkflowGraph) -> Result<Self, WorkflowError> {
        let mut graph = DiGraph::with_capacity(workflow.nodes.len(), workflow.connections.len());
        let mut index = HashMap::with_capacity(workflow.nodes.len());

        for node in &workflow.nodes {
            if index.contains_key(&node.id) {
                return Err(WorkflowError::Invalid(format!(
                    "duplicate instance id '{}'",
                    node.id
                )));
            }
            let idx = graph.add_node(node.id.clone());
            index.insert(node.id.clone(), idx);
        }

        for conn in &workflow.connections {
            let from = *index
                .get(&conn.from_node)
                .ok_or_else(|| WorkflowError::InstanceNotFound(conn.from_node.clone()))?;
            let to = *index
                .get(&conn.to_node)
                .ok_or_else(|| WorkflowError::InstanceNotFound(conn.to_node.clone()))?;
            // Several port-level connections between the same pair are one dependency
            if graph.find_edge(from, to).is_none() {
                graph.add_edge(from, to, ());
            }
        }

        Ok(Self { graph, index })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Depth-first search keeping a recursion stack; a back-edge into the
    /// stack is reported with the offending path.
    pub fn detect_cycle(&self) -> Result<(), WorkflowError> {
        let mut marks = vec![Mark::Unvisited; self.graph.node_count()];
        let mut path: Vec<NodeIndex> = Vec::new();

        for start in self.graph.node_indices() {
            if marks[start.index()] != Mark::Unvisited {
                continue;
            }
            marks[start.index()] = Mark::OnStack;
            path.push(start);
            let mut stack = vec![self.frame(start, Direction::Outgoing)];

            while let Some(frame) = stack.last_mut() {
                let next = frame.neighbors.get(frame.next).copied();
                frame.next += 1;

                match next {
                    Some(succ) => match marks[succ.index()] {
                        Mark::OnStack => return Err(self.cycle_error(&path, succ)),
                        Mark::Unvisited => {
                            marks[succ.index()] = Mark::OnStack;
                            path.push(succ);
                            stack.push(self.frame(succ, Direction::Outgoing));
                        }
                        Mark::Done => {}
                    },
                    None => {
                        if let Some(done) = stack.pop() {
                            marks[done.node.index()] = Mark::Done;
                        }
                        path.pop();
                    }
                }
            }
        }

        Ok(())
    }

    /// Kahn's algorithm with a FIFO queue; ties break by declaration order
    pub fn topological_order(&self) -> Result<Vec<NodeId>, WorkflowError> {
        let mut indegree = self.indegree_vec();
        let mut queue: VecDeque<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|idx| indegree[idx.index()] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.graph.node_count());

        while let Some(idx) = queue.pop_front() {
            order.push(self.graph[idx].clone());
            for succ in self.successor_indices(idx) {
                indegree[succ.index()] -= 1;
                if indegree[succ.index()] == 0 {
                    queue.push_back(succ);
                }
            }
        }

        if order.len() != self.graph.node_count() {
            return Err(self.unresolved_cycle(&order));
        }
        Ok(order)
    }

    /// Groups of mutually independent nodes. Every node in level N+1 depends
    /// only on nodes of earlier levels.
    pub fn level_partition(&self) -> Result<Vec<Vec<NodeId>>, WorkflowError> {
        let mut indegree = self.indegree_vec();
        let mut current: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|idx| indegree[idx.index()] == 0)
            .collect();
        let mut levels = Vec::new();
        let mut placed = Vec::with_capacity(self.graph.node_count());

        while !current.is_empty() {
            let mut next = Vec::new();
            for &idx in &current {
                for succ in self.successor_indices(idx) {
                    indegree[succ.index()] -= 1;
                    if indegree[succ.index()] == 0 {
                        next.push(succ);
                    }
                }
            }
            next.sort_by_key(|idx| idx.index());

            let level: Vec<NodeId> = current.iter().map(|idx| self.graph[*idx].clone()).collect();
            placed.extend(level.iter().cloned());
            levels.push(level);
            current = next;
        }

        if placed.len() != self.graph.node_count() {
            return Err(self.unresolved_cycle(&placed));
        }
        Ok(levels)
    }

    /// Number of distinct predecessors per node
    pub fn indegrees(&self) -> HashMap<NodeId, usize> {
        let indegree = self.indegree_vec();
        self.graph
            .node_indices()
            .map(|idx| (self.graph[idx].clone(), indegree[idx.index()]))
            .collect()
    }

    /// Distinct predecessors in connection order
    pub fn predecessors(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|idx| {
                self.predecessor_indices(*idx)
                    .into_iter()
                    .map(|p| self.graph[p].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Distinct successors in connection order
    pub fn successors(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|idx| {
                self.successor_indices(*idx)
                    .into_iter()
                    .map(|s| self.graph[s].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Slice of the graph affected by re-running `target`.
    ///
    /// The upstream closure comes first in post-order. The downstream closure
    /// is walked forward; before a successor is placed, the rest of its
    /// ancestry is pulled in, so no node precedes one of its dependencies.
    pub fn scoped_execution_order(&self, target: &str) -> Result<ScopedPlan, WorkflowError> {
        let target_idx = *self
            .index
            .get(target)
            .ok_or_else(|| WorkflowError::InstanceNotFound(target.to_string()))?;

        let mut marks = vec![Mark::Unvisited; self.graph.node_count()];
        let mut order = Vec::new();
        self.place_after_ancestors(target_idx, &mut marks, &mut order)?;

        let mut downstream = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = self.successor_indices(target_idx).into();
        while let Some(idx) = queue.pop_front() {
            if !downstream.insert(idx) {
                continue;
            }
            self.place_after_ancestors(idx, &mut marks, &mut order)?;
            queue.extend(self.successor_indices(idx));
        }

        Ok(ScopedPlan {
            target: target.to_string(),
            order: order.into_iter().map(|idx| self.graph[idx].clone()).collect(),
            downstream: downstream
                .into_iter()
                .map(|idx| self.graph[idx].clone())
                .collect(),
        })
    }

    /// Append `start` to `order` after every ancestor not yet placed.
    ///
    /// Walks predecessors with an explicit stack so arbitrarily deep chains
    /// cannot exhaust the thread stack.
    fn place_after_ancestors(
        &self,
        start: NodeIndex,
        marks: &mut [Mark],
        order: &mut Vec<NodeIndex>,
    ) -> Result<(), WorkflowError> {
        if marks[start.index()] == Mark::Done {
            return Ok(());
        }
        marks[start.index()] = Mark::OnStack;
        let mut stack = vec![self.frame(start, Direction::Incoming)];

        while let Some(frame) = stack.last_mut() {
            let next = frame.neighbors.get(frame.next).copied();
            frame.next += 1;

            match next {
                Some(pred) => match marks[pred.index()] {
                    Mark::OnStack => return Err(self.ancestry_cycle(&stack, pred)),
                    Mark::Unvisited => {
                        marks[pred.index()] = Mark::OnStack;
                        stack.push(self.frame(pred, Direction::Incoming));
                    }
                    Mark::Done => {}
                },
                None => {
                    if let Some(done) = stack.pop() {
                        marks[done.node.index()] = Mark::Done;
                        order.push(done.node);
                    }
                }
            }
        }

        Ok(())
    }

    /// Cycle found while walking backwards from `stack[0]`; reported in
    /// edge direction
    fn ancestry_cycle(&self, stack: &[Frame], back_to: NodeIndex) -> WorkflowError {
        let mut path: Vec<NodeIndex> = stack.iter().rev().map(|f| f.node).collect();
        path.truncate(
            path.iter()
                .position(|p| *p == back_to)
                .map(|p| p + 1)
                .unwrap_or(path.len()),
        );
        path.push(path.first().copied().unwrap_or(back_to));
        WorkflowError::CycleDetected {
            path: path.into_iter().map(|p| self.graph[p].clone()).collect(),
        }
    }

    fn frame(&self, node: NodeIndex, direction: Direction) -> Frame {
        let neighbors = match direction {
            Direction::Outgoing => self.successor_indices(node),
            Direction::Incoming => self.predecessor_indices(node),
        };
        Frame {
            node,
            neighbors,
            next: 0,
        }
    }

    fn successor_indices(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut succ: Vec<_> = self.graph.neighbors_directed(idx, Direction::Outgoing).collect();
        // petgraph yields the most recent edge first
        succ.reverse();
        succ
    }

    fn predecessor_indices(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut preds: Vec<_> = self.graph.neighbors_directed(idx, Direction::Incoming).collect();
        preds.reverse();
        preds
    }

    fn indegree_vec(&self) -> Vec<usize> {
        self.graph
            .node_indices()
            .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
            .collect()
    }

    fn cycle_error(&self, path: &[NodeIndex], back_to: NodeIndex) -> WorkflowError {
        let start = path.iter().position(|p| *p == back_to).unwrap_or(0);
        let mut cycle: Vec<NodeId> = path[start..].iter().map(|p| self.graph[*p].clone()).collect();
        cycle.push(self.graph[back_to].clone());
        WorkflowError::CycleDetected { path: cycle }
    }

    /// Kahn left nodes behind; report the concrete cycle when DFS can find it
    fn unresolved_cycle(&self, placed: &[NodeId]) -> WorkflowError {
        match self.detect_cycle() {
            Err(err) => err,
            Ok(()) => {
                let placed: HashSet<&NodeId> = placed.iter().collect();
                WorkflowError::CycleDetected {
                    path: self
                        .graph
                        .node_indices()
                        .map(|idx| self.graph[idx].clone())
                        .filter(|id| !placed.contains(id))
                        .collect(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studiocore::WorkflowBuilder;

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> WorkflowGraph {
        let mut builder = WorkflowBuilder::new("test");
        for id in nodes {
            builder = builder.add_node(*id, "noop");
        }
        for (from, to) in edges {
            builder = builder.pipe(*from, *to);
        }
        builder.build()
    }

    fn diamond() -> WorkflowGraph {
        graph(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
        )
    }

    #[test]
    fn topological_order_respects_every_connection() {
        let wf = graph(
            &["e", "d", "c", "b", "a"],
            &[("a", "b"), ("b", "c"), ("a", "d"), ("d", "c"), ("c", "e")],
        );
        let analyzer = GraphAnalyzer::new(&wf).unwrap();
        let order = analyzer.topological_order().unwrap();
        assert_eq!(order.len(), 5);

        let pos: HashMap<_, _> = order.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
        for conn in &wf.connections {
            assert!(pos[conn.from_node.as_str()] < pos[conn.to_node.as_str()]);
        }
    }

    #[test]
    fn kahn_breaks_ties_by_declaration_order() {
        let wf = graph(&["x", "y", "z"], &[]);
        let order = GraphAnalyzer::new(&wf).unwrap().topological_order().unwrap();
        assert_eq!(order, vec!["x", "y", "z"]);
    }

    #[test]
    fn level_partition_of_fan_out() {
        let wf = graph(&["a", "b", "c"], &[("a", "b"), ("a", "c")]);
        let levels = GraphAnalyzer::new(&wf).unwrap().level_partition().unwrap();
        assert_eq!(levels, vec![vec!["a".to_string()], vec!["b".into(), "c".into()]]);
    }

    #[test]
    fn level_partition_of_diamond() {
        let levels = GraphAnalyzer::new(&diamond()).unwrap().level_partition().unwrap();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[2], vec!["d".to_string()]);
    }

    #[test]
    fn detects_cycle_with_path() {
        let wf = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "b")]);
        let analyzer = GraphAnalyzer::new(&wf).unwrap();
        match analyzer.detect_cycle() {
            Err(WorkflowError::CycleDetected { path }) => {
                assert_eq!(path, vec!["b", "c", "b"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
        assert!(matches!(
            analyzer.topological_order(),
            Err(WorkflowError::CycleDetected { .. })
        ));
        assert!(matches!(
            analyzer.level_partition(),
            Err(WorkflowError::CycleDetected { .. })
        ));
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let wf = graph(&["a"], &[("a", "a")]);
        assert!(GraphAnalyzer::new(&wf).unwrap().detect_cycle().is_err());
    }

    #[test]
    fn dangling_connection_is_rejected() {
        let wf = graph(&["a"], &[("a", "ghost")]);
        assert_eq!(
            GraphAnalyzer::new(&wf).err(),
            Some(WorkflowError::InstanceNotFound("ghost".into()))
        );
    }

    #[test]
    fn duplicate_ports_between_pair_count_once() {
        let wf = WorkflowBuilder::new("t")
            .add_node("a", "noop")
            .add_node("b", "noop")
            .connect("a", "image", "b", "image")
            .connect("a", "prompt", "b", "prompt")
            .build();
        let analyzer = GraphAnalyzer::new(&wf).unwrap();
        assert_eq!(analyzer.indegrees()["b"], 1);
        assert_eq!(analyzer.predecessors("b"), vec!["a"]);
    }

    #[test]
    fn scoped_plan_for_leaf_is_its_ancestry() {
        let analyzer = GraphAnalyzer::new(&diamond()).unwrap();
        let plan = analyzer.scoped_execution_order("d").unwrap();
        assert_eq!(plan.order.last().map(String::as_str), Some("d"));
        assert_eq!(plan.order.len(), 4);
        assert!(plan.downstream.is_empty());
    }

    #[test]
    fn scoped_plan_pulls_in_sibling_dependencies() {
        let analyzer = GraphAnalyzer::new(&diamond()).unwrap();
        let plan = analyzer.scoped_execution_order("b").unwrap();
        let pos = |id: &str| plan.order.iter().position(|n| n == id).unwrap();

        assert_eq!(plan.order.len(), 4);
        assert!(pos("a") < pos("b"));
        assert!(pos("c") < pos("d"));
        assert!(pos("b") < pos("d"));
        assert_eq!(plan.downstream, HashSet::from(["d".to_string()]));
    }

    #[test]
    fn scoped_plan_orders_chained_descendants() {
        // t -> d, t -> e, e -> d: d must come after e
        let wf = graph(&["t", "d", "e"], &[("t", "d"), ("t", "e"), ("e", "d")]);
        let plan = GraphAnalyzer::new(&wf).unwrap().scoped_execution_order("t").unwrap();
        assert_eq!(plan.order, vec!["t", "e", "d"]);
    }

    #[test]
    fn scoped_plan_excludes_unrelated_nodes() {
        let wf = graph(&["a", "b", "x"], &[("a", "b")]);
        let plan = GraphAnalyzer::new(&wf).unwrap().scoped_execution_order("b").unwrap();
        assert_eq!(plan.order, vec!["a", "b"]);
    }

    #[test]
    fn scoped_plan_handles_deep_chains() {
        let ids: Vec<String> = (0..20_000).map(|i| format!("n{}", i)).collect();
        let mut builder = WorkflowBuilder::new("chain");
        for id in &ids {
            builder = builder.add_node(id.as_str(), "noop");
        }
        for pair in ids.windows(2) {
            builder = builder.pipe(pair[0].as_str(), pair[1].as_str());
        }
        let analyzer = GraphAnalyzer::new(&builder.build()).unwrap();

        let plan = analyzer.scoped_execution_order("n19999").unwrap();
        assert_eq!(plan.order.len(), 20_000);
        assert_eq!(plan.order.first().map(String::as_str), Some("n0"));
        assert_eq!(plan.order.last().map(String::as_str), Some("n19999"));

        let plan = analyzer.scoped_execution_order("n0").unwrap();
        assert_eq!(plan.order.len(), 20_000);
        assert_eq!(plan.downstream.len(), 19_999);
    }

    #[test]
    fn scoped_plan_reports_cycle_in_edge_direction() {
        let wf = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "b")]);
        let analyzer = GraphAnalyzer::new(&wf).unwrap();
        match analyzer.scoped_execution_order("c") {
            Err(WorkflowError::CycleDetected { path }) => {
                assert_eq!(path, vec!["b", "c", "b"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn scoped_plan_guards_against_cycles() {
        let wf = graph(&["a", "b"], &[("a", "b"), ("b", "a")]);
        let analyzer = GraphAnalyzer::new(&wf).unwrap();
        assert!(matches!(
            analyzer.scoped_execution_order("a"),
            Err(WorkflowError::CycleDetected { .. })
        ));
    }
}
