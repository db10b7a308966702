//! LLM Query node
//!
//! Sends a prompt (plus optional context) to a language model. The model
//! call itself is host-provided: register an executor for
//! [`LlmQueryNode::NODE_TYPE`] before running a graph that uses it.

use workflow_engine::{NodeCategory, NodeDescriptor, NodeTypeDefinition, PortSchema, PortType};

/// LLM Query node
///
/// # Inputs
/// - `prompt` - The question or instruction
/// - `context` - Optional supporting text (search results, documents)
/// - `model` - Model handle from a model selector
/// - `apiKey` (hidden) - Provider credential, redacted on export
///
/// # Outputs
/// - `result` - The model's reply
pub struct LlmQueryNode;

impl LlmQueryNode {
    pub const NODE_TYPE: &'static str = "llm-query";
    pub const PORT_PROMPT: &'static str = "prompt";
    pub const PORT_CONTEXT: &'static str = "context";
    pub const PORT_MODEL: &'static str = "model";
    pub const PORT_API_KEY: &'static str = "apiKey";
    pub const PORT_RESULT: &'static str = "result";
}

impl NodeDescriptor for LlmQueryNode {
    fn definition() -> NodeTypeDefinition {
        NodeTypeDefinition::new(
            Self::NODE_TYPE,
            NodeCategory::Ai,
            "LLM Query",
            "Ask a language model and return its reply",
        )
        .input(PortSchema::new(Self::PORT_PROMPT, "Prompt", PortType::Prompt))
        .input(PortSchema::new(Self::PORT_CONTEXT, "Context", PortType::Text))
        .input(PortSchema::new(Self::PORT_MODEL, "Model", PortType::Model))
        .input(
            PortSchema::new(Self::PORT_API_KEY, "API Key", PortType::Text)
                .with_default(serde_json::json!(""))
                .hidden(),
        )
        .output(PortSchema::new(Self::PORT_RESULT, "Result", PortType::Text))
    }
}

inventory::submit!(workflow_engine::DescriptorFn(LlmQueryNode::definition));
