//! Image Output node

use std::sync::Arc;

use async_trait::async_trait;
use workflow_engine::{
    Node, NodeCategory, NodeDescriptor, NodeExecutor, NodeTypeDefinition, PortSchema, PortType,
    PortValues, Result,
};

/// Displays an image, video or audio clip arriving on `media`
pub struct ImageOutputNode;

impl ImageOutputNode {
    pub const NODE_TYPE: &'static str = "image-output";
    pub const PORT_MEDIA: &'static str = "media";
}

impl NodeDescriptor for ImageOutputNode {
    fn definition() -> NodeTypeDefinition {
        NodeTypeDefinition::new(
            Self::NODE_TYPE,
            NodeCategory::Output,
            "Media Output",
            "Displays generated images, video or audio",
        )
        .input(PortSchema::new(Self::PORT_MEDIA, "Media", PortType::Media))
    }
}

inventory::submit!(workflow_engine::DescriptorFn(ImageOutputNode::definition));

fn executor() -> Arc<dyn NodeExecutor> {
    Arc::new(ImageOutputNode)
}

inventory::submit!(workflow_engine::ExecutorFn(ImageOutputNode::NODE_TYPE, executor));

#[async_trait]
impl NodeExecutor for ImageOutputNode {
    async fn execute(&self, _node: &Node, mut inputs: PortValues) -> Result<PortValues> {
        let media = inputs
            .remove(Self::PORT_MEDIA)
            .unwrap_or(serde_json::Value::Null);
        Ok(PortValues::from([(Self::PORT_MEDIA.to_string(), media)]))
    }
}
