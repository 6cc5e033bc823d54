use async_trait::async_trait;
use std::sync::Arc;
use studiocore::{Node, NodeContext, NodeError, NodeOutput, PortType};
use studioruntime::{ConfigField, NodeCatalogEntry};
use tokio::time::{sleep, Duration};

/// Delay execution for a specified duration, passing inputs through
pub struct DelayNode;

#[async_trait]
impl Node for DelayNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let delay_ms = ctx
            .config
            .get("delay_ms")
            .and_then(|v| v.as_f64())
            .unwrap_or(1000.0);
        if delay_ms < 0.0 {
            return Err(NodeError::with_code(
                format!("delay_ms must be non-negative, got {}", delay_ms),
                "CONFIGURATION",
            ));
        }

        tracing::debug!(node_id = %ctx.node_id, delay_ms, "delaying");
        sleep(Duration::from_millis(delay_ms as u64)).await;

        Ok(NodeOutput::from(ctx.inputs))
    }
}

pub(crate) fn entry() -> NodeCatalogEntry {
    NodeCatalogEntry::new("time.delay", "time", Arc::new(DelayNode))
        .with_description("Delay execution for specified milliseconds")
        .with_config_field(ConfigField::new("delay_ms", PortType::Number).with_default(1000.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_inputs_through() {
        let ctx = NodeContext::new("wait")
            .with_input("image", "https://cdn.example/a.png")
            .with_config("delay_ms", 1.0);
        let output = DelayNode.execute(ctx).await.unwrap();
        assert_eq!(
            output.outputs.get("image").and_then(|v| v.as_str()),
            Some("https://cdn.example/a.png")
        );
    }

    #[tokio::test]
    async fn rejects_negative_delay() {
        let ctx = NodeContext::new("wait").with_config("delay_ms", -5.0);
        let err = DelayNode.execute(ctx).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("CONFIGURATION"));
    }
}
