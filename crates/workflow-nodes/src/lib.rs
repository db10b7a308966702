//! Workflow Nodes
//!
//! Built-in node types for the workflow engine. Each module describes its
//! node type (category, label, default ports) and submits the definition
//! for link-time collection; node types that need nothing beyond their
//! inputs also submit an executor. Linking this crate is enough for
//! `NodeRegistry::with_builtins()` to see them.
//!
//! # Categories
//!
//! - **Input**: user-provided text, media and files
//! - **Output**: display of results
//! - **AI**: model-backed nodes (executors supplied by the host)
//! - **Data**: retrieval and structured-data extraction
//! - **Flow**: branching and joining
//! - **Utility**: logging and debugging helpers

pub mod ai;
pub mod data;
pub mod flow;
pub mod input;
pub mod output;
pub mod utility;

pub use ai::*;
pub use data::*;
pub use flow::*;
pub use input::*;
pub use output::*;
pub use utility::*;

/// A bare node of `node_type` for executor tests
#[cfg(test)]
pub(crate) fn test_node(node_type: &str) -> workflow_engine::Node {
    workflow_engine::Node {
        id: format!("{}-test", node_type),
        node_type: node_type.to_string(),
        position: workflow_engine::Position::default(),
        data: workflow_engine::NodeData::default(),
    }
}
