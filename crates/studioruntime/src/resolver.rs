use crate::registry::NodeCatalogEntry;
use crate::store::ExecutionStateStore;
use std::collections::HashMap;
use studiocore::{NodeInstance, Value, WorkflowGraph};

/// Gather the input values for `instance` about to run.
///
/// Precedence per port: output of a completed upstream node, then (entry
/// nodes only) the run's injected inputs, then the instance config, then the
/// port default. Ports fed by a node that has not completed stay unresolved;
/// whether that is an error is up to the node.
pub fn resolve_inputs(
    instance: &NodeInstance,
    entry: &NodeCatalogEntry,
    workflow: &WorkflowGraph,
    store: &ExecutionStateStore,
    injected: &HashMap<String, Value>,
) -> HashMap<String, Value> {
    let mut inputs = HashMap::new();

    for conn in workflow.incoming(&instance.id) {
        let Some(source) = store.get(&conn.from_node).filter(|s| s.is_completed()) else {
            tracing::debug!(
                node_id = %instance.id,
                port = %conn.to_port,
                source = %conn.from_node,
                "upstream not completed, leaving port unresolved"
            );
            continue;
        };
        if let Some(value) = source.outputs.get(&conn.from_port) {
            inputs.insert(conn.to_port.clone(), value.clone());
        }
    }

    if workflow.is_entry(&instance.id) {
        for (port, value) in injected {
            inputs
                .entry(port.clone())
                .or_insert_with(|| value.clone());
        }
    }

    for port in &entry.inputs {
        if inputs.contains_key(&port.id) {
            continue;
        }
        if let Some(value) = instance.config.get(&port.id) {
            inputs.insert(port.id.clone(), value.clone());
        } else if let Some(default) = &port.default {
            inputs.insert(port.id.clone(), default.clone());
        }
    }

    inputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InputPort;
    use async_trait::async_trait;
    use std::sync::Arc;
    use studiocore::{
        Node, NodeContext, NodeError, NodeOutput, NodeStatePatch, PortType, WorkflowBuilder,
    };

    struct Noop;

    #[async_trait]
    impl Node for Noop {
        async fn execute(&self, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
            Ok(NodeOutput::new())
        }
    }

    fn entry() -> NodeCatalogEntry {
        NodeCatalogEntry::new("image.edit", "image", Arc::new(Noop))
            .with_input(InputPort::required("image", PortType::Image))
            .with_input(InputPort::required("prompt", PortType::Text))
            .with_input(InputPort::optional("strength", PortType::Number).with_default(0.5))
            .with_input(InputPort::optional("seed", PortType::Number))
    }

    fn workflow() -> WorkflowGraph {
        WorkflowBuilder::new("wf")
            .add_node("src", "image.input")
            .add_node("edit", "image.edit")
            .with_config("prompt", "make it blue")
            .with_config("image", Value::Image("config.png".into()))
            .connect("src", "image", "edit", "image")
            .build()
    }

    #[test]
    fn connection_beats_config_beats_default() {
        let wf = workflow();
        let mut store = ExecutionStateStore::new();
        store.update(
            "src",
            NodeStatePatch::completed(HashMap::from([(
                "image".to_string(),
                Value::Image("upstream.png".into()),
            )])),
        );

        let inputs = resolve_inputs(&wf.nodes[1], &entry(), &wf, &store, &HashMap::new());
        assert_eq!(inputs.get("image"), Some(&Value::Image("upstream.png".into())));
        assert_eq!(inputs.get("prompt"), Some(&Value::Text("make it blue".into())));
        assert_eq!(inputs.get("strength"), Some(&Value::Number(0.5)));
        assert!(!inputs.contains_key("seed"));
    }

    #[test]
    fn incomplete_upstream_falls_back_to_config() {
        let wf = workflow();
        let mut store = ExecutionStateStore::new();
        store.update("src", NodeStatePatch::running());

        let inputs = resolve_inputs(&wf.nodes[1], &entry(), &wf, &store, &HashMap::new());
        assert_eq!(inputs.get("image"), Some(&Value::Image("config.png".into())));
    }

    #[test]
    fn injected_values_only_reach_entry_nodes() {
        let mut wf = workflow();
        let store = ExecutionStateStore::new();
        let injected = HashMap::from([("prompt".to_string(), Value::Text("from caller".into()))]);

        let inputs = resolve_inputs(&wf.nodes[1], &entry(), &wf, &store, &injected);
        assert_eq!(inputs.get("prompt"), Some(&Value::Text("make it blue".into())));

        wf.entry_nodes.push("edit".into());
        let inputs = resolve_inputs(&wf.nodes[1], &entry(), &wf, &store, &injected);
        assert_eq!(inputs.get("prompt"), Some(&Value::Text("from caller".into())));
    }
}
