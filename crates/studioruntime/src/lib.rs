//! Workflow execution runtime
//!
//! This crate provides the execution engine that runs workflow graphs: the
//! node catalog, graph analysis, the execution state store, input
//! resolution and the sequential, level-parallel and scoped coordinators.

mod analyzer;
mod executor;
mod registry;
mod resolver;
mod runtime;
mod store;

pub use analyzer::{GraphAnalyzer, ScopedPlan};
pub use executor::{ExecutionFailure, ExecutionStrategy, WorkflowExecutor, WorkflowResult};
pub use registry::{ConfigField, InputPort, NodeCatalog, NodeCatalogEntry, OutputPort};
pub use resolver::resolve_inputs;
pub use runtime::{RuntimeConfig, StudioRuntime};
pub use store::ExecutionStateStore;
