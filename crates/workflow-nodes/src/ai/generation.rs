//! Generative model nodes
//!
//! Image generation and text embedding. Like [`LlmQueryNode`](super::LlmQueryNode)
//! these only describe themselves; the host registers the executors.

use workflow_engine::{NodeCategory, NodeDescriptor, NodeTypeDefinition, PortSchema, PortType};

/// Generates an image from a prompt
pub struct ImageGenerationNode;

impl ImageGenerationNode {
    pub const NODE_TYPE: &'static str = "image-generation";
}

impl NodeDescriptor for ImageGenerationNode {
    fn definition() -> NodeTypeDefinition {
        NodeTypeDefinition::new(
            Self::NODE_TYPE,
            NodeCategory::Ai,
            "Image Generation",
            "Generate an image from a text prompt",
        )
        .input(PortSchema::new("prompt", "Prompt", PortType::Prompt))
        .input(PortSchema::new("model", "Model", PortType::Model))
        .input(
            PortSchema::new("apiKey", "API Key", PortType::Text)
                .with_default(serde_json::json!(""))
                .hidden(),
        )
        .output(PortSchema::new("image", "Image", PortType::Image))
    }
}

/// Turns text into an embedding vector
pub struct EmbeddingNode;

impl EmbeddingNode {
    pub const NODE_TYPE: &'static str = "embedding";
}

impl NodeDescriptor for EmbeddingNode {
    fn definition() -> NodeTypeDefinition {
        NodeTypeDefinition::new(
            Self::NODE_TYPE,
            NodeCategory::Ai,
            "Embedding",
            "Encode text as an embedding vector",
        )
        .input(PortSchema::new("text", "Text", PortType::Text))
        .input(PortSchema::new("model", "Model", PortType::Model))
        .output(PortSchema::new("embedding", "Embedding", PortType::Embedding))
    }
}

inventory::submit!(workflow_engine::DescriptorFn(ImageGenerationNode::definition));
inventory::submit!(workflow_engine::DescriptorFn(EmbeddingNode::definition));
