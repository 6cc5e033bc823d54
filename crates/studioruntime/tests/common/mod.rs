#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use studiocore::{
    ExecutionObserver, ExecutionStatus, Node, NodeContext, NodeError, NodeExecutionState,
    NodeOutput, PortType, Value,
};
use studioruntime::{InputPort, NodeCatalog, NodeCatalogEntry, OutputPort};

/// Records every `execute` call and how many ran at once
#[derive(Default)]
pub struct CallLog {
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl CallLog {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, node_id: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == node_id).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Pure node: output is its id followed by its sorted inputs.
///
/// Config `fail` makes it return an `API_ERROR`; config `delay_ms` makes it
/// sleep first.
pub struct ConcatNode {
    log: Arc<CallLog>,
}

#[async_trait]
impl Node for ConcatNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        self.log.calls.lock().unwrap().push(ctx.node_id.clone());
        let now = self.log.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(ms) = ctx.config.get("delay_ms").and_then(Value::as_f64) {
            tokio::time::sleep(Duration::from_millis(ms as u64)).await;
        }
        self.log.in_flight.fetch_sub(1, Ordering::SeqCst);

        if ctx.config.get("fail").and_then(Value::as_bool) == Some(true) {
            return Err(NodeError::with_code(
                format!("{} failed", ctx.node_id),
                "API_ERROR",
            ));
        }

        let mut parts: Vec<String> = ctx
            .inputs
            .iter()
            .map(|(port, value)| format!("{}={}", port, value.as_str().unwrap_or("?")))
            .collect();
        parts.sort();
        Ok(NodeOutput::new().with_output(
            "output",
            format!("{}[{}]", ctx.node_id, parts.join(",")),
        ))
    }
}

pub struct PanicNode;

#[async_trait]
impl Node for PanicNode {
    async fn execute(&self, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        panic!("generation backend exploded");
    }
}

pub fn catalog(log: Arc<CallLog>) -> Arc<NodeCatalog> {
    let mut catalog = NodeCatalog::new();
    catalog.register(
        NodeCatalogEntry::new("test.concat", "test", Arc::new(ConcatNode { log }))
            .with_input(InputPort::optional("seed", PortType::Text))
            .with_output(OutputPort::new("output", PortType::Text)),
    );
    catalog.register(NodeCatalogEntry::new("test.panic", "test", Arc::new(PanicNode)));
    Arc::new(catalog)
}

/// Observer recording state transitions and progress
#[derive(Default)]
pub struct Recorder {
    pub transitions: Mutex<Vec<(String, ExecutionStatus)>>,
    pub progress: Mutex<Vec<u8>>,
}

impl Recorder {
    pub fn statuses_of(&self, node_id: &str) -> Vec<ExecutionStatus> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == node_id)
            .map(|(_, status)| *status)
            .collect()
    }

    pub fn progress(&self) -> Vec<u8> {
        self.progress.lock().unwrap().clone()
    }
}

impl ExecutionObserver for Recorder {
    fn on_node_state_change(&self, node_id: &str, state: &NodeExecutionState) {
        self.transitions
            .lock()
            .unwrap()
            .push((node_id.to_string(), state.status));
    }

    fn on_progress(&self, percent: u8) {
        self.progress.lock().unwrap().push(percent);
    }
}

pub fn output_text(states: &HashMap<String, NodeExecutionState>, node_id: &str) -> Option<String> {
    states
        .get(node_id)?
        .outputs
        .get("output")?
        .as_str()
        .map(str::to_string)
}
