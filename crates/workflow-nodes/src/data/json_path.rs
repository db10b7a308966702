//! JSON Path node
//!
//! Extracts one value from a JSON document by RFC 6901 pointer
//! (`/results/0/title`). Dotted paths (`results.0.title`) are accepted and
//! converted.

use std::sync::Arc;

use async_trait::async_trait;
use workflow_engine::{
    Node, NodeCategory, NodeDescriptor, NodeEngineError, NodeExecutor, NodeTypeDefinition,
    PortSchema, PortType, PortValues, Result,
};

/// JSON Path node
///
/// # Inputs
/// - `data` - Object or array to read from; strings are parsed as JSON
/// - `path` - Pointer or dotted path (empty selects the whole document)
///
/// # Outputs
/// - `value` - The selected value
/// - `found` - Whether the path resolved
pub struct JsonPathNode;

impl JsonPathNode {
    pub const NODE_TYPE: &'static str = "json-path";
    pub const PORT_DATA: &'static str = "data";
    pub const PORT_PATH: &'static str = "path";
    pub const PORT_VALUE: &'static str = "value";
    pub const PORT_FOUND: &'static str = "found";
}

impl NodeDescriptor for JsonPathNode {
    fn definition() -> NodeTypeDefinition {
        NodeTypeDefinition::new(
            Self::NODE_TYPE,
            NodeCategory::Data,
            "JSON Path",
            "Extract a value from structured data",
        )
        .input(PortSchema::new(Self::PORT_DATA, "Data", PortType::Any))
        .input(
            PortSchema::new(Self::PORT_PATH, "Path", PortType::Text)
                .with_default(serde_json::json!("")),
        )
        .output(PortSchema::new(Self::PORT_VALUE, "Value", PortType::Any))
        .output(PortSchema::new(Self::PORT_FOUND, "Found", PortType::Boolean))
    }
}

inventory::submit!(workflow_engine::DescriptorFn(JsonPathNode::definition));

fn executor() -> Arc<dyn NodeExecutor> {
    Arc::new(JsonPathNode)
}

inventory::submit!(workflow_engine::ExecutorFn(JsonPathNode::NODE_TYPE, executor));

/// Normalise a dotted path into a JSON pointer
fn to_pointer(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() || path.starts_with('/') {
        return path.to_string();
    }
    path.split('.')
        .map(|segment| segment.replace('~', "~0").replace('/', "~1"))
        .fold(String::new(), |mut pointer, segment| {
            pointer.push('/');
            pointer.push_str(&segment);
            pointer
        })
}

#[async_trait]
impl NodeExecutor for JsonPathNode {
    async fn execute(&self, node: &Node, mut inputs: PortValues) -> Result<PortValues> {
        let data = match inputs.remove(Self::PORT_DATA) {
            Some(serde_json::Value::String(text)) => serde_json::from_str(&text).map_err(|e| {
                NodeEngineError::failed(format!(
                    "node '{}': data is not valid JSON: {}",
                    node.id, e
                ))
            })?,
            Some(value) => value,
            None => serde_json::Value::Null,
        };
        let path = inputs
            .get(Self::PORT_PATH)
            .and_then(|p| p.as_str())
            .unwrap_or_default();

        let selected = data.pointer(&to_pointer(path)).cloned();
        let found = selected.is_some();
        if !found {
            log::debug!("JsonPathNode {}: path '{}' not found", node.id, path);
        }

        Ok(PortValues::from([
            (
                Self::PORT_VALUE.to_string(),
                selected.unwrap_or(serde_json::Value::Null),
            ),
            (Self::PORT_FOUND.to_string(), serde_json::Value::Bool(found)),
        ]))
    }
}
