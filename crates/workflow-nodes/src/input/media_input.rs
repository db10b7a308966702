//! Media and file input nodes
//!
//! Each of these nodes holds a user-picked reference (a data URL, a path,
//! or whatever the host's picker produces) in a hidden input and emits it
//! unchanged on a typed output.

use std::sync::Arc;

use async_trait::async_trait;
use workflow_engine::{
    Node, NodeCategory, NodeDescriptor, NodeExecutor, NodeTypeDefinition, PortSchema, PortType,
    PortValues, Result,
};

/// Forward the hidden `port` input to the output of the same name
fn forward(node: &Node, port: &str, mut inputs: PortValues) -> PortValues {
    let value = inputs.remove(port).unwrap_or(serde_json::Value::Null);
    if value.is_null() {
        log::debug!("{} '{}' has no {} selected", node.node_type, node.id, port);
    }
    PortValues::from([(port.to_string(), value)])
}

fn media_definition(
    node_type: &str,
    label: &str,
    description: &str,
    port: &str,
    port_label: &str,
    port_type: PortType,
) -> NodeTypeDefinition {
    NodeTypeDefinition::new(node_type, NodeCategory::Input, label, description)
        .input(PortSchema::new(port, port_label, port_type.clone()).hidden())
        .output(PortSchema::new(port, port_label, port_type))
}

/// Image Input node: outputs the selected image on `image`
pub struct ImageInputNode;

impl ImageInputNode {
    pub const NODE_TYPE: &'static str = "image-input";
    pub const PORT_IMAGE: &'static str = "image";
}

impl NodeDescriptor for ImageInputNode {
    fn definition() -> NodeTypeDefinition {
        media_definition(
            Self::NODE_TYPE,
            "Image Input",
            "Provides an image to the workflow",
            Self::PORT_IMAGE,
            "Image",
            PortType::Image,
        )
    }
}

#[async_trait]
impl NodeExecutor for ImageInputNode {
    async fn execute(&self, node: &Node, inputs: PortValues) -> Result<PortValues> {
        Ok(forward(node, Self::PORT_IMAGE, inputs))
    }
}

/// Audio Input node: outputs the selected clip on `audio`
pub struct AudioInputNode;

impl AudioInputNode {
    pub const NODE_TYPE: &'static str = "audio-input";
    pub const PORT_AUDIO: &'static str = "audio";
}

impl NodeDescriptor for AudioInputNode {
    fn definition() -> NodeTypeDefinition {
        media_definition(
            Self::NODE_TYPE,
            "Audio Input",
            "Provides an audio clip to the workflow",
            Self::PORT_AUDIO,
            "Audio",
            PortType::Audio,
        )
    }
}

#[async_trait]
impl NodeExecutor for AudioInputNode {
    async fn execute(&self, node: &Node, inputs: PortValues) -> Result<PortValues> {
        Ok(forward(node, Self::PORT_AUDIO, inputs))
    }
}

/// File Input node: outputs the selected file reference on `file`
pub struct FileInputNode;

impl FileInputNode {
    pub const NODE_TYPE: &'static str = "file-input";
    pub const PORT_FILE: &'static str = "file";
}

impl NodeDescriptor for FileInputNode {
    fn definition() -> NodeTypeDefinition {
        media_definition(
            Self::NODE_TYPE,
            "File Input",
            "Provides a document or other file to the workflow",
            Self::PORT_FILE,
            "File",
            PortType::File,
        )
    }
}

#[async_trait]
impl NodeExecutor for FileInputNode {
    async fn execute(&self, node: &Node, inputs: PortValues) -> Result<PortValues> {
        Ok(forward(node, Self::PORT_FILE, inputs))
    }
}

inventory::submit!(workflow_engine::DescriptorFn(ImageInputNode::definition));
inventory::submit!(workflow_engine::DescriptorFn(AudioInputNode::definition));
inventory::submit!(workflow_engine::DescriptorFn(FileInputNode::definition));

fn image_executor() -> Arc<dyn NodeExecutor> {
    Arc::new(ImageInputNode)
}

fn audio_executor() -> Arc<dyn NodeExecutor> {
    Arc::new(AudioInputNode)
}

fn file_executor() -> Arc<dyn NodeExecutor> {
    Arc::new(FileInputNode)
}

inventory::submit!(workflow_engine::ExecutorFn(ImageInputNode::NODE_TYPE, image_executor));
inventory::submit!(workflow_engine::ExecutorFn(AudioInputNode::NODE_TYPE, audio_executor));
inventory::submit!(workflow_engine::ExecutorFn(FileInputNode::NODE_TYPE, file_executor));
