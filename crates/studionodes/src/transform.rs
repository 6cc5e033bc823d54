use async_trait::async_trait;
use std::sync::Arc;
use studiocore::{Node, NodeContext, NodeError, NodeOutput, PortType, Value};
use studioruntime::{InputPort, NodeCatalogEntry, OutputPort};

/// Parse JSON text into a `json` value
pub struct JsonParseNode;

#[async_trait]
impl Node for JsonParseNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let input = ctx
            .require_input("json")?
            .as_str()
            .ok_or_else(|| NodeError::invalid_input("json", "text"))?;

        let parsed: serde_json::Value = serde_json::from_str(input).map_err(|e| {
            NodeError::with_code(format!("JSON parse error: {}", e), "PARSE_ERROR")
        })?;

        Ok(NodeOutput::new().with_output("parsed", Value::Json(parsed)))
    }
}

pub(crate) fn json_parse_entry() -> NodeCatalogEntry {
    NodeCatalogEntry::new("transform.json_parse", "transform", Arc::new(JsonParseNode))
        .with_description("Parse JSON string")
        .with_input(InputPort::required("json", PortType::Text))
        .with_output(OutputPort::new("parsed", PortType::Json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn parses_text_into_json() {
        let ctx = NodeContext::new("p").with_input("json", r#"{"scenes": 3}"#);
        let output = JsonParseNode.execute(ctx).await.unwrap();
        assert_eq!(
            output.outputs.get("parsed"),
            Some(&Value::Json(json!({"scenes": 3})))
        );
    }

    #[tokio::test]
    async fn reports_missing_and_malformed_input() {
        let err = JsonParseNode.execute(NodeContext::new("p")).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("MISSING_INPUT"));

        let ctx = NodeContext::new("p").with_input("json", "{nope");
        let err = JsonParseNode.execute(ctx).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("PARSE_ERROR"));
    }
}
