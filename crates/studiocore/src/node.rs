use crate::{NodeError, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Executable unit behind a catalog entry.
///
/// Expected failures are returned as `Err(NodeError)`. A panic is caught by
/// the coordinator and recorded with the generic `EXECUTION_ERROR` code.
/// Implementations enforce their own timeouts.
#[async_trait]
pub trait Node: Send + Sync {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError>;
}

/// Inputs and configuration handed to one `execute` call
#[derive(Debug, Clone, Default)]
pub struct NodeContext {
    /// Instance being executed
    pub node_id: String,

    /// Resolved input port values
    pub inputs: HashMap<String, Value>,

    /// Instance configuration
    pub config: HashMap<String, Value>,

    /// Named workflow variables
    pub variables: HashMap<String, Value>,
}

impl NodeContext {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            ..Self::default()
        }
    }

    pub fn with_input(mut self, port: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(port.into(), value.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Get required input or return error
    pub fn require_input(&self, name: &str) -> Result<&Value, NodeError> {
        self.inputs
            .get(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| NodeError::missing_input(name))
    }

    /// Get config value or return error
    pub fn require_config(&self, name: &str) -> Result<&Value, NodeError> {
        self.config.get(name).ok_or_else(|| {
            NodeError::with_code(format!("Missing config: {}", name), "CONFIGURATION")
        })
    }

    /// Get config with default
    pub fn get_config_or(&self, name: &str, default: Value) -> Value {
        self.config.get(name).cloned().unwrap_or(default)
    }
}

/// Output from node execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    /// Output port values
    pub outputs: HashMap<String, Value>,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, port: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(port.into(), value.into());
        self
    }
}

impl From<HashMap<String, Value>> for NodeOutput {
    fn from(outputs: HashMap<String, Value>) -> Self {
        Self { outputs }
    }
}
