use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable error codes surfaced in `WorkflowResult` failures
pub mod codes {
    pub const NODE_NOT_FOUND: &str = "NODE_NOT_FOUND";
    pub const INSTANCE_NOT_FOUND: &str = "INSTANCE_NOT_FOUND";
    pub const CYCLE_DETECTED: &str = "CYCLE_DETECTED";
    pub const DEADLOCK: &str = "DEADLOCK";
    pub const WORKFLOW_NOT_FOUND: &str = "WORKFLOW_NOT_FOUND";
    pub const INVALID_WORKFLOW: &str = "INVALID_WORKFLOW";
    pub const EXECUTION_ERROR: &str = "EXECUTION_ERROR";
    pub const UPSTREAM_FAILED: &str = "UPSTREAM_FAILED";
}

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure reported by a node's executable unit.
///
/// The code is caller-defined (`MISSING_IMAGE`, `API_ERROR`, ...) and is
/// passed through to the workflow result untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl NodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    pub fn missing_input(port: &str) -> Self {
        Self::with_code(format!("Missing required input: {}", port), "MISSING_INPUT")
    }

    pub fn invalid_input(port: &str, expected: &str) -> Self {
        Self::with_code(
            format!("Invalid input type for '{}': expected {}", port, expected),
            "INVALID_INPUT",
        )
    }

    pub fn code_or_default(&self) -> &str {
        self.code.as_deref().unwrap_or(codes::EXECUTION_ERROR)
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for NodeError {}

/// Structural errors. These are fatal regardless of `continue_on_error`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Invalid workflow: {0}")]
    Invalid(String),

    #[error("Cyclic dependency detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    #[error("Unknown node type '{node_type}' for instance '{instance}'")]
    NodeNotFound { instance: String, node_type: String },

    #[error("Connection references unknown instance: {0}")]
    InstanceNotFound(String),

    #[error("Deadlock: {} node(s) can never become ready", remaining.len())]
    Deadlock { remaining: Vec<String> },
}

impl WorkflowError {
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::NotFound(_) => codes::WORKFLOW_NOT_FOUND,
            WorkflowError::Invalid(_) => codes::INVALID_WORKFLOW,
            WorkflowError::CycleDetected { .. } => codes::CYCLE_DETECTED,
            WorkflowError::NodeNotFound { .. } => codes::NODE_NOT_FOUND,
            WorkflowError::InstanceNotFound(_) => codes::INSTANCE_NOT_FOUND,
            WorkflowError::Deadlock { .. } => codes::DEADLOCK,
        }
    }

    /// Instance the error can be attributed to, if any
    pub fn node_id(&self) -> Option<&str> {
        match self {
            WorkflowError::NodeNotFound { instance, .. } => Some(instance),
            WorkflowError::InstanceNotFound(id) => Some(id),
            _ => None,
        }
    }
}
