//! Text Input node
//!
//! A simple passthrough node that provides user-entered text to workflows.
//! The text lives in a hidden input port edited through the node's form,
//! so the node is always an entry point.

use std::sync::Arc;

use async_trait::async_trait;
use workflow_engine::{
    Node, NodeCategory, NodeDescriptor, NodeExecutor, NodeTypeDefinition, PortSchema, PortType,
    PortValues, Result,
};

/// Text Input node
///
/// # Inputs
/// - `text` (hidden) - The entered text
///
/// # Outputs
/// - `text` - The text value (empty string if not provided)
pub struct TextInputNode;

impl TextInputNode {
    pub const NODE_TYPE: &'static str = "text-input";
    /// Port name shared by the hidden input and the output
    pub const PORT_TEXT: &'static str = "text";
}

impl NodeDescriptor for TextInputNode {
    fn definition() -> NodeTypeDefinition {
        NodeTypeDefinition::new(
            Self::NODE_TYPE,
            NodeCategory::Input,
            "Text Input",
            "Provides text input to the workflow",
        )
        .input(
            PortSchema::new(Self::PORT_TEXT, "Text", PortType::Text)
                .with_default(serde_json::json!(""))
                .hidden(),
        )
        .output(PortSchema::new(Self::PORT_TEXT, "Text", PortType::Text))
    }
}

inventory::submit!(workflow_engine::DescriptorFn(TextInputNode::definition));

fn executor() -> Arc<dyn NodeExecutor> {
    Arc::new(TextInputNode)
}

inventory::submit!(workflow_engine::ExecutorFn(TextInputNode::NODE_TYPE, executor));

#[async_trait]
impl NodeExecutor for TextInputNode {
    async fn execute(&self, node: &Node, mut inputs: PortValues) -> Result<PortValues> {
        let text = match inputs.remove(Self::PORT_TEXT) {
            Some(serde_json::Value::String(text)) => text,
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        log::debug!(
            "TextInputNode {}: passing through {} chars",
            node.id,
            text.len()
        );

        Ok(PortValues::from([(
            Self::PORT_TEXT.to_string(),
            serde_json::Value::String(text),
        )]))
    }
}
