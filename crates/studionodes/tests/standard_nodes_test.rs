use std::collections::HashMap;
use std::sync::Arc;
use studiocore::{ExecutionStatus, Value, WorkflowBuilder};
use studioruntime::StudioRuntime;

fn runtime() -> StudioRuntime {
    StudioRuntime::new(Arc::new(studionodes::standard_catalog()))
}

#[test]
fn standard_catalog_lists_every_node() {
    let catalog = studionodes::standard_catalog();
    assert_eq!(
        catalog.list_node_types(),
        vec![
            "debug.log",
            "text.input",
            "text.template",
            "time.delay",
            "transform.json_parse",
        ]
    );
    assert_eq!(catalog.by_category("text").len(), 2);
}

#[tokio::test]
async fn prompt_pipeline_renders_template() {
    let workflow = WorkflowBuilder::new("prompt pipeline")
        .add_node("subject", "text.input")
        .add_node("prompt", "text.template")
        .with_config("template", "{input}, {var:style} style")
        .add_node("log", "debug.log")
        .with_label("Logged")
        .connect("subject", "text", "prompt", "input")
        .connect("prompt", "text", "log", "message")
        .entry("subject")
        .exit("log")
        .variable("style", "cinematic")
        .build();

    let inputs = HashMap::from([("text".to_string(), Value::Text("a lighthouse".into()))]);
    let result = runtime().run(&workflow, inputs).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(
        result.outputs["Logged"]["message"].as_str(),
        Some("a lighthouse, cinematic style")
    );
}

#[tokio::test]
async fn unconfigured_template_passes_input_through() {
    let workflow = WorkflowBuilder::new("bare template")
        .add_node("prompt", "text.template")
        .with_config("input", "a misty forest")
        .exit("prompt")
        .build();

    let result = runtime().run(&workflow, HashMap::new()).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(
        result.outputs["prompt"]["text"].as_str(),
        Some("a misty forest")
    );
}

#[tokio::test]
async fn missing_required_input_is_the_node_error() {
    let workflow = WorkflowBuilder::new("no text")
        .add_node("subject", "text.input")
        .add_node("parse", "transform.json_parse")
        .connect("subject", "text", "parse", "json")
        .build();

    let result = runtime().run(&workflow, HashMap::new()).await;

    assert!(!result.success);
    let error = result.error.expect("node error");
    assert_eq!(error.node_id.as_deref(), Some("subject"));
    assert_eq!(error.code, "MISSING_INPUT");
    assert_eq!(result.node_states["parse"].status, ExecutionStatus::Pending);
}

#[tokio::test]
async fn configured_text_feeds_json_parse() {
    let workflow = WorkflowBuilder::new("parse")
        .add_node("raw", "text.input")
        .with_config("text", r#"{"shots": ["wide", "close"]}"#)
        .add_node("parse", "transform.json_parse")
        .connect("raw", "text", "parse", "json")
        .exit("parse")
        .build();

    let result = runtime().run(&workflow, HashMap::new()).await;

    assert!(result.success);
    assert_eq!(
        result.outputs["parse"]["parsed"],
        Value::Json(serde_json::json!({"shots": ["wide", "close"]}))
    );
}
