//! Data nodes
//!
//! Retrieval and transformation of structured data.

mod json_path;
mod retrieval;

pub use json_path::JsonPathNode;
pub use retrieval::{DocumentQueryNode, WebSearchNode};
