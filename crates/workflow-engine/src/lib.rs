//! Workflow Engine - Graph editing and execution for composable AI pipelines
//!
//! A workflow is a directed graph of typed nodes. Each node exposes named
//! input and output ports tagged with a data type; edges carry values from
//! an output port to an input port. This crate provides:
//!
//! - A type registry of node definitions and their default port schemas
//! - A port-type compatibility matrix and a connection validator
//! - A graph store that keeps the node and edge sets valid across edits,
//!   with compressed snapshot-based undo/redo
//! - An execution coordinator that runs nodes in dependency order,
//!   containing failures to the downstream subgraph
//! - Workflow persistence over a pluggable key-value store
//!
//! # Architecture
//!
//! - `NodeRegistry`: node types, schemas and executors (built-ins are
//!   collected at link time through `inventory`)
//! - `GraphStore`: the single owner of a workflow being edited
//! - `ExecutionCoordinator`: one run at a time over a graph snapshot
//! - `EventSink`: generic event streaming for a UI bridge
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use workflow_engine::{ExecutionCoordinator, GraphStore, NodeRegistry, Position};
//!
//! let registry = Arc::new(NodeRegistry::with_builtins());
//! let mut store = GraphStore::new(registry.clone());
//! let prompt = store.add_node("text-input", Position::new(0.0, 0.0))?;
//! let output = store.add_node("text-output", Position::new(300.0, 0.0))?;
//! store.connect(&prompt.id, "output-text", &output.id, "input-text")?;
//!
//! let state = ExecutionCoordinator::new(registry).run(store.graph()).await?;
//! ```

pub mod builder;
pub mod compatibility;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod history;
pub mod persistence;
pub mod registry;
pub mod store;
pub mod types;
pub mod validation;

// Re-export key types
pub use builder::WorkflowBuilder;
pub use compatibility::{CompatibilityIndex, CompatibilityMatrix};
pub use config::{EngineConfig, ErrorPolicy, ExecutionOptions, UnknownTypePolicy};
pub use coordinator::{ExecutionCoordinator, ExecutionState, NodeExecutionState};
pub use descriptor::{
    DescriptorFn, NodeCategory, NodeDescriptor, NodeTypeDefinition, PortSchema, PortSchemaSet,
};
pub use error::{ConnectionError, NodeEngineError, Result};
pub use events::{EventSink, NullEventSink, VecEventSink, WorkflowEvent};
pub use history::GraphHistory;
pub use persistence::{
    FileStore, KeyValueStore, MemoryStore, WorkflowMeta, WorkflowRepository, WorkflowSummary,
};
pub use registry::{
    CallbackNodeExecutor, ExecutorFn, NodeExecutor, NodeRegistry, PortValues,
    SyncCallbackNodeExecutor,
};
pub use store::{EdgeUpdate, GraphSnapshot, GraphStore};
pub use types::{
    ConnectStatus, Edge, EdgeId, Handle, Node, NodeData, NodeId, NodeStatus, Port, PortDirection,
    PortName, PortType, Position, Workflow, WorkflowGraph,
};
pub use validation::{
    retain_valid_edges, validate_connection, validate_workflow, GraphIssue, PortRef,
};
