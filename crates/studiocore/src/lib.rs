//! Core abstractions for the studio workflow engine
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on: values, the node contract, workflow graphs,
//! execution state and events. It contains no execution logic.

mod builder;
mod error;
pub mod events;
mod node;
mod state;
mod value;
mod workflow;

pub use builder::{WorkflowBuilder, DEFAULT_INPUT_PORT, DEFAULT_OUTPUT_PORT};
pub use error::{codes, FlowError, NodeError, WorkflowError};
pub use events::*;
pub use node::{Node, NodeContext, NodeOutput};
pub use state::{ExecutionStatus, NodeExecutionState, NodeStatePatch};
pub use value::{PortType, Value};
pub use workflow::{Connection, NodeId, NodeInstance, Position, WorkflowGraph, WorkflowId};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
