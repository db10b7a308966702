//! Logger node
//!
//! Writes whatever passes through it to the `log` facade and forwards it
//! unchanged. Handy for inspecting intermediate values in a run.

use std::sync::Arc;

use async_trait::async_trait;
use workflow_engine::{
    Node, NodeCategory, NodeDescriptor, NodeExecutor, NodeTypeDefinition, PortSchema, PortType,
    PortValues, Result,
};

pub struct LoggerNode;

impl LoggerNode {
    pub const NODE_TYPE: &'static str = "logger";
    pub const PORT_VALUE: &'static str = "value";
}

impl NodeDescriptor for LoggerNode {
    fn definition() -> NodeTypeDefinition {
        NodeTypeDefinition::new(
            Self::NODE_TYPE,
            NodeCategory::Utility,
            "Logger",
            "Log a value and pass it through",
        )
        .input(PortSchema::new(Self::PORT_VALUE, "Value", PortType::Any))
        .output(PortSchema::new(Self::PORT_VALUE, "Value", PortType::Any))
    }
}

inventory::submit!(workflow_engine::DescriptorFn(LoggerNode::definition));

fn executor() -> Arc<dyn NodeExecutor> {
    Arc::new(LoggerNode)
}

inventory::submit!(workflow_engine::ExecutorFn(LoggerNode::NODE_TYPE, executor));

#[async_trait]
impl NodeExecutor for LoggerNode {
    async fn execute(&self, node: &Node, mut inputs: PortValues) -> Result<PortValues> {
        let value = inputs
            .remove(Self::PORT_VALUE)
            .unwrap_or(serde_json::Value::Null);
        log::info!("[{}] {}: {}", node.id, node.data.label, value);
        Ok(PortValues::from([(Self::PORT_VALUE.to_string(), value)]))
    }
}
