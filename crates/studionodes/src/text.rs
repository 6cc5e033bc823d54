use async_trait::async_trait;
use std::sync::Arc;
use studiocore::{Node, NodeContext, NodeError, NodeOutput, PortType, Value};
use studioruntime::{ConfigField, InputPort, NodeCatalogEntry, OutputPort};

/// Emits the text it receives on `text`, injected or configured
pub struct TextInputNode;

#[async_trait]
impl Node for TextInputNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let text = ctx
            .require_input("text")?
            .as_str()
            .ok_or_else(|| NodeError::invalid_input("text", "text"))?;
        Ok(NodeOutput::new().with_output("text", text))
    }
}

const DEFAULT_TEMPLATE: &str = "{input}";

/// Fills `{port}` and `{var:name}` placeholders of the configured template
pub struct TextTemplateNode;

#[async_trait]
impl Node for TextTemplateNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let template = ctx.get_config_or("template", Value::from(DEFAULT_TEMPLATE));
        let template = template
            .as_str()
            .ok_or_else(|| NodeError::invalid_input("template", "text"))?;

        let mut rendered = template.to_string();
        for (port, value) in &ctx.inputs {
            rendered = rendered.replace(&format!("{{{}}}", port), &display(value));
        }
        for (name, value) in &ctx.variables {
            rendered = rendered.replace(&format!("{{var:{}}}", name), &display(value));
        }

        Ok(NodeOutput::new().with_output("text", rendered))
    }
}

fn display(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_json().to_string(),
    }
}

pub(crate) fn input_entry() -> NodeCatalogEntry {
    NodeCatalogEntry::new("text.input", "text", Arc::new(TextInputNode))
        .with_description("Provide a piece of text to the graph")
        .with_input(InputPort::required("text", PortType::Text))
        .with_output(OutputPort::new("text", PortType::Text))
}

pub(crate) fn template_entry() -> NodeCatalogEntry {
    NodeCatalogEntry::new("text.template", "text", Arc::new(TextTemplateNode))
        .with_description("Render a text template from inputs and workflow variables")
        .with_input(InputPort::optional("input", PortType::Any).with_default(""))
        .with_output(OutputPort::new("text", PortType::Text))
        .with_config_field(
            ConfigField::new("template", PortType::Text).with_default(DEFAULT_TEMPLATE),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn template_fills_inputs_and_variables() {
        let mut ctx = NodeContext::new("t")
            .with_input("input", "a red fox")
            .with_input("count", 3.0)
            .with_config("template", "{count} shots of {input} in {var:style}");
        ctx.variables.insert("style".into(), Value::Text("watercolor".into()));

        let output = TextTemplateNode.execute(ctx).await.unwrap();
        assert_eq!(
            output.outputs.get("text").and_then(|v| v.as_str()),
            Some("3.0 shots of a red fox in watercolor")
        );
    }

    #[tokio::test]
    async fn template_defaults_to_input() {
        let ctx = NodeContext::new("t").with_input("input", "a quiet harbor");
        let output = TextTemplateNode.execute(ctx).await.unwrap();
        assert_eq!(
            output.outputs.get("text").and_then(|v| v.as_str()),
            Some("a quiet harbor")
        );
    }

    #[tokio::test]
    async fn text_input_requires_text() {
        let err = TextInputNode.execute(NodeContext::new("t")).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("MISSING_INPUT"));
    }
}
