//! Text Output node
//!
//! Terminal node that displays whatever text reaches it.

use std::sync::Arc;

use async_trait::async_trait;
use workflow_engine::{
    Node, NodeCategory, NodeDescriptor, NodeExecutor, NodeTypeDefinition, PortSchema, PortType,
    PortValues, Result,
};

/// Text Output node
///
/// The `text` input accepts any type; non-string values are rendered as
/// JSON.
pub struct TextOutputNode;

impl TextOutputNode {
    pub const NODE_TYPE: &'static str = "text-output";
    pub const PORT_TEXT: &'static str = "text";
}

impl NodeDescriptor for TextOutputNode {
    fn definition() -> NodeTypeDefinition {
        NodeTypeDefinition::new(
            Self::NODE_TYPE,
            NodeCategory::Output,
            "Text Output",
            "Displays text results",
        )
        .input(PortSchema::new(Self::PORT_TEXT, "Text", PortType::Any))
    }
}

inventory::submit!(workflow_engine::DescriptorFn(TextOutputNode::definition));

fn executor() -> Arc<dyn NodeExecutor> {
    Arc::new(TextOutputNode)
}

inventory::submit!(workflow_engine::ExecutorFn(TextOutputNode::NODE_TYPE, executor));

#[async_trait]
impl NodeExecutor for TextOutputNode {
    async fn execute(&self, _node: &Node, mut inputs: PortValues) -> Result<PortValues> {
        let text = match inputs.remove(Self::PORT_TEXT) {
            Some(serde_json::Value::String(text)) => text,
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => serde_json::to_string_pretty(&other)?,
        };
        Ok(PortValues::from([(
            Self::PORT_TEXT.to_string(),
            serde_json::Value::String(text),
        )]))
    }
}
