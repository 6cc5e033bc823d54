//! Fluent construction of workflow graphs.

use crate::{NodeInstance, Value, WorkflowGraph};

/// Port names used by [`WorkflowBuilder::pipe`]
pub const DEFAULT_OUTPUT_PORT: &str = "output";
pub const DEFAULT_INPUT_PORT: &str = "input";

/// Fluent builder for workflow graphs
///
/// # Example
///
/// ```
/// use studiocore::WorkflowBuilder;
///
/// let graph = WorkflowBuilder::new("thumbnail")
///     .add_node("prompt", "text.input")
///     .with_config("text", "a lighthouse at dusk")
///     .add_node("render", "text.template")
///     .connect("prompt", "text", "render", "input")
///     .entry("prompt")
///     .exit("render")
///     .build();
///
/// assert_eq!(graph.nodes.len(), 2);
/// ```
pub struct WorkflowBuilder {
    graph: WorkflowGraph,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            graph: WorkflowGraph::new(name),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.graph.description = Some(description.into());
        self
    }

    pub fn add_node(mut self, id: impl Into<String>, node_type: impl Into<String>) -> Self {
        self.graph.add_node(NodeInstance::new(id, node_type));
        self
    }

    pub fn add_instance(mut self, instance: NodeInstance) -> Self {
        self.graph.add_node(instance);
        self
    }

    /// Set a config value on the most recently added node
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Some(node) = self.graph.nodes.last_mut() {
            node.config.insert(key.into(), value.into());
        }
        self
    }

    /// Set the label of the most recently added node
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        if let Some(node) = self.graph.nodes.last_mut() {
            node.label = Some(label.into());
        }
        self
    }

    /// Set a config value on any node by id. Unknown ids are ignored.
    pub fn set_node_config(
        mut self,
        id: &str,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        if let Some(node) = self.graph.find_node_mut(id) {
            node.config.insert(key.into(), value.into());
        }
        self
    }

    pub fn connect(
        mut self,
        from: impl Into<String>,
        from_port: impl Into<String>,
        to: impl Into<String>,
        to_port: impl Into<String>,
    ) -> Self {
        self.graph.connect(from, from_port, to, to_port);
        self
    }

    /// Connect `from.output` to `to.input`
    pub fn pipe(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.connect(from, DEFAULT_OUTPUT_PORT, to, DEFAULT_INPUT_PORT)
    }

    pub fn entry(mut self, id: impl Into<String>) -> Self {
        self.graph.entry_nodes.push(id.into());
        self
    }

    pub fn exit(mut self, id: impl Into<String>) -> Self {
        self.graph.exit_nodes.push(id.into());
        self
    }

    pub fn continue_on_error(mut self, enabled: bool) -> Self {
        self.graph.continue_on_error = enabled;
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.graph.variables.insert(name.into(), value.into());
        self
    }

    /// Build the graph without validation
    pub fn build(self) -> WorkflowGraph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_uses_conventional_ports() {
        let graph = WorkflowBuilder::new("wf")
            .add_node("a", "t")
            .add_node("b", "t")
            .pipe("a", "b")
            .build();
        let conn = &graph.connections[0];
        assert_eq!(conn.from_port, "output");
        assert_eq!(conn.to_port, "input");
    }

    #[test]
    fn set_node_config_targets_named_node() {
        let graph = WorkflowBuilder::new("wf")
            .add_node("a", "t")
            .add_node("b", "t")
            .set_node_config("a", "seed", 7i64)
            .with_label("Final")
            .build();
        assert_eq!(graph.nodes[0].config.get("seed"), Some(&Value::Number(7.0)));
        assert!(graph.nodes[1].config.is_empty());
        assert_eq!(graph.nodes[1].label(), "Final");
    }

    #[test]
    fn graph_survives_json_round_trip() {
        let graph = WorkflowBuilder::new("wf")
            .add_node("a", "text.input")
            .with_config("text", "hello")
            .add_node("b", "debug.log")
            .connect("a", "text", "b", "message")
            .entry("a")
            .exit("b")
            .continue_on_error(true)
            .build();

        let decoded = WorkflowGraph::from_json(&graph.to_json().unwrap()).unwrap();
        assert_eq!(decoded.id, graph.id);
        assert_eq!(decoded.connections, graph.connections);
        assert_eq!(decoded.exit_nodes, vec!["b".to_string()]);
        assert!(decoded.continue_on_error);
    }
}
