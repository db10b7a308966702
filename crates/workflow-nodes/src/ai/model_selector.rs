//! Model Selector node
//!
//! Picks a model and emits a handle (`{"provider", "model"}`) that model
//! consuming nodes take on their `model` input. The selection is read from
//! the node's `provider` and `model` data fields.

use std::sync::Arc;

use async_trait::async_trait;
use workflow_engine::{
    Node, NodeCategory, NodeDescriptor, NodeEngineError, NodeExecutor, NodeTypeDefinition,
    PortSchema, PortType, PortValues, Result,
};

pub struct ModelSelectorNode;

impl ModelSelectorNode {
    pub const NODE_TYPE: &'static str = "model-selector";
    pub const PORT_API_KEY: &'static str = "apiKey";
    pub const PORT_MODEL: &'static str = "model";
}

impl NodeDescriptor for ModelSelectorNode {
    fn definition() -> NodeTypeDefinition {
        NodeTypeDefinition::new(
            Self::NODE_TYPE,
            NodeCategory::Ai,
            "Model Selector",
            "Choose the model used by downstream AI nodes",
        )
        .input(
            PortSchema::new(Self::PORT_API_KEY, "API Key", PortType::Text)
                .with_default(serde_json::json!(""))
                .hidden(),
        )
        .output(PortSchema::new(Self::PORT_MODEL, "Model", PortType::Model))
    }
}

inventory::submit!(workflow_engine::DescriptorFn(ModelSelectorNode::definition));

fn executor() -> Arc<dyn NodeExecutor> {
    Arc::new(ModelSelectorNode)
}

inventory::submit!(workflow_engine::ExecutorFn(ModelSelectorNode::NODE_TYPE, executor));

#[async_trait]
impl NodeExecutor for ModelSelectorNode {
    async fn execute(&self, node: &Node, _inputs: PortValues) -> Result<PortValues> {
        let model = node
            .data
            .extra
            .get("model")
            .and_then(|v| v.as_str())
            .filter(|m| !m.is_empty())
            .ok_or_else(|| {
                NodeEngineError::failed(format!("node '{}' has no model selected", node.id))
            })?;
        let provider = node
            .data
            .extra
            .get("provider")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        // The key stays on the selector; consumers carry their own hidden key
        Ok(PortValues::from([(
            Self::PORT_MODEL.to_string(),
            serde_json::json!({ "provider": provider, "model": model }),
        )]))
    }
}
