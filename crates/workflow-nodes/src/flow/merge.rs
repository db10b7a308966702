//! Merge node
//!
//! Collects up to four inputs into an array, skipping unset ones, and
//! joins the text inputs into a single string.

use std::sync::Arc;

use async_trait::async_trait;
use workflow_engine::{
    Node, NodeCategory, NodeDescriptor, NodeExecutor, NodeTypeDefinition, PortSchema, PortType,
    PortValues, Result,
};

pub struct MergeNode;

impl MergeNode {
    pub const NODE_TYPE: &'static str = "merge";
    pub const INPUT_PORTS: [&'static str; 4] = ["a", "b", "c", "d"];
    pub const PORT_SEPARATOR: &'static str = "separator";
    pub const PORT_ITEMS: &'static str = "items";
    pub const PORT_TEXT: &'static str = "text";
}

impl NodeDescriptor for MergeNode {
    fn definition() -> NodeTypeDefinition {
        let mut definition = NodeTypeDefinition::new(
            Self::NODE_TYPE,
            NodeCategory::Flow,
            "Merge",
            "Combine several inputs into one list",
        );
        for port in Self::INPUT_PORTS {
            definition = definition.input(PortSchema::new(
                port,
                port.to_ascii_uppercase(),
                PortType::Any,
            ));
        }
        definition
            .input(
                PortSchema::new(Self::PORT_SEPARATOR, "Separator", PortType::Text)
                    .with_default(serde_json::json!("\n")),
            )
            .output(PortSchema::new(Self::PORT_ITEMS, "Items", PortType::Array))
            .output(PortSchema::new(Self::PORT_TEXT, "Text", PortType::Text))
    }
}

inventory::submit!(workflow_engine::DescriptorFn(MergeNode::definition));

fn executor() -> Arc<dyn NodeExecutor> {
    Arc::new(MergeNode)
}

inventory::submit!(workflow_engine::ExecutorFn(MergeNode::NODE_TYPE, executor));

#[async_trait]
impl NodeExecutor for MergeNode {
    async fn execute(&self, _node: &Node, mut inputs: PortValues) -> Result<PortValues> {
        let items: Vec<serde_json::Value> = Self::INPUT_PORTS
            .iter()
            .filter_map(|port| inputs.remove(*port))
            .filter(|value| !value.is_null())
            .collect();

        let separator = inputs
            .get(Self::PORT_SEPARATOR)
            .and_then(|s| s.as_str())
            .unwrap_or("\n");
        let text = items
            .iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(separator);

        Ok(PortValues::from([
            (Self::PORT_ITEMS.to_string(), serde_json::Value::Array(items)),
            (Self::PORT_TEXT.to_string(), serde_json::Value::String(text)),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_node;

    #[tokio::test]
    async fn test_merges_set_inputs() {
        let inputs = PortValues::from([
            ("a".to_string(), serde_json::json!("first")),
            ("b".to_string(), serde_json::Value::Null),
            ("c".to_string(), serde_json::json!(3)),
            ("separator".to_string(), serde_json::json!(", ")),
        ]);
        let outputs = MergeNode
            .execute(&test_node(MergeNode::NODE_TYPE), inputs)
            .await
            .unwrap();
        assert_eq!(outputs["items"], serde_json::json!(["first", 3]));
        assert_eq!(outputs["text"], "first, 3");
    }
}
