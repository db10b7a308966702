//! Flow nodes
//!
//! Nodes for control flow: branching and joining.

mod conditional;
mod merge;

pub use conditional::ConditionalNode;
pub use merge::MergeNode;
