use async_trait::async_trait;
use std::sync::Arc;
use studiocore::{Node, NodeContext, NodeError, NodeOutput, PortType, Value};
use studioruntime::{InputPort, NodeCatalogEntry, OutputPort};

/// Simple debug node that logs its inputs
pub struct DebugNode;

#[async_trait]
impl Node for DebugNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let message = ctx
            .inputs
            .get("message")
            .cloned()
            .unwrap_or_else(|| Value::Text("(no message)".to_string()));

        tracing::info!(node_id = %ctx.node_id, "DEBUG: {}", message.to_json());

        // Also log all inputs for visibility
        for (key, value) in &ctx.inputs {
            tracing::debug!(node_id = %ctx.node_id, "  {}: {:?}", key, value);
        }

        Ok(NodeOutput::new().with_output("message", message))
    }
}

pub(crate) fn entry() -> NodeCatalogEntry {
    NodeCatalogEntry::new("debug.log", "debug", Arc::new(DebugNode))
        .with_description("Logs input values for debugging")
        .with_input(InputPort::optional("message", PortType::Any))
        .with_output(OutputPort::new("message", PortType::Any))
}
