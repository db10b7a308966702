//! Conditional node
//!
//! Routes a value to one of two outputs based on a boolean condition.
//! The untaken output is left unset, so nodes fed from it receive `null`.

use std::sync::Arc;

use async_trait::async_trait;
use workflow_engine::{
    Node, NodeCategory, NodeDescriptor, NodeEngineError, NodeExecutor, NodeTypeDefinition,
    PortSchema, PortType, PortValues, Result,
};

/// Conditional node
///
/// # Inputs
/// - `condition` (required) - Boolean condition
/// - `value` - Value to route
///
/// # Outputs
/// - `true` - The value when the condition holds
/// - `false` - The value otherwise
pub struct ConditionalNode;

impl ConditionalNode {
    pub const NODE_TYPE: &'static str = "conditional";
    pub const PORT_CONDITION: &'static str = "condition";
    pub const PORT_VALUE: &'static str = "value";
    pub const PORT_TRUE: &'static str = "true";
    pub const PORT_FALSE: &'static str = "false";
}

impl NodeDescriptor for ConditionalNode {
    fn definition() -> NodeTypeDefinition {
        NodeTypeDefinition::new(
            Self::NODE_TYPE,
            NodeCategory::Flow,
            "Conditional",
            "Routes data based on a boolean condition",
        )
        .input(PortSchema::new(Self::PORT_CONDITION, "Condition", PortType::Boolean))
        .input(PortSchema::new(Self::PORT_VALUE, "Value", PortType::Any))
        .output(PortSchema::new(Self::PORT_TRUE, "True", PortType::Any))
        .output(PortSchema::new(Self::PORT_FALSE, "False", PortType::Any))
    }
}

inventory::submit!(workflow_engine::DescriptorFn(ConditionalNode::definition));

fn executor() -> Arc<dyn NodeExecutor> {
    Arc::new(ConditionalNode)
}

inventory::submit!(workflow_engine::ExecutorFn(ConditionalNode::NODE_TYPE, executor));

#[async_trait]
impl NodeExecutor for ConditionalNode {
    async fn execute(&self, node: &Node, mut inputs: PortValues) -> Result<PortValues> {
        let condition = inputs
            .get(Self::PORT_CONDITION)
            .and_then(|c| c.as_bool())
            .ok_or_else(|| {
                NodeEngineError::failed(format!(
                    "node '{}': missing boolean input 'condition'",
                    node.id
                ))
            })?;
        let value = inputs
            .remove(Self::PORT_VALUE)
            .unwrap_or(serde_json::Value::Null);

        let port = if condition {
            Self::PORT_TRUE
        } else {
            Self::PORT_FALSE
        };
        log::debug!("ConditionalNode {}: routing to '{}'", node.id, port);

        Ok(PortValues::from([(port.to_string(), value)]))
    }
}
