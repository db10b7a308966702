//! AI nodes
//!
//! Model-backed node types. Except for the model selector, their executors
//! call external services and are supplied by the host application.

mod generation;
mod llm_query;
mod model_selector;

pub use generation::{EmbeddingNode, ImageGenerationNode};
pub use llm_query::LlmQueryNode;
pub use model_selector::ModelSelectorNode;
