//! Node type definitions and their default port schema
//!
//! A node-type module describes itself with a [`NodeTypeDefinition`]: its
//! category, display metadata and the ports a fresh instance starts with.
//! The engine only ever sees this description; rendering and execution stay
//! behind the opaque executor reference held by the registry.
//!
//! Modules submit their definition for link-time collection:
//!
//! ```ignore
//! impl NodeDescriptor for TextInputNode {
//!     fn definition() -> NodeTypeDefinition { /* ... */ }
//! }
//!
//! inventory::submit!(workflow_engine::DescriptorFn(TextInputNode::definition));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Port, PortName, PortType};

/// Category used to group node types in the palette
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// User-provided data (text, files, media)
    Input,
    /// Display or export of results
    Output,
    /// Model calls (LLM, image generation, ...)
    Ai,
    /// Control flow (conditions, loops)
    Flow,
    /// Data transformation and retrieval
    Data,
    /// Logging, debugging and helpers
    Utility,
    /// User-defined nodes
    Custom,
}

impl NodeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Ai => "ai",
            Self::Flow => "flow",
            Self::Data => "data",
            Self::Utility => "utility",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default schema for one port of a node type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSchema {
    /// Port name, unique within the inputs (or outputs)
    pub name: PortName,
    /// Human-readable label
    pub label: String,
    /// Data type tag
    #[serde(rename = "type")]
    pub port_type: PortType,
    /// Placeholder value for new instances
    #[serde(default)]
    pub default_value: serde_json::Value,
    /// Excluded from connections and the UI
    #[serde(default)]
    pub hidden: bool,
}

impl PortSchema {
    /// Create a visible port with a null placeholder
    pub fn new(name: impl Into<String>, label: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            port_type,
            default_value: serde_json::Value::Null,
            hidden: false,
        }
    }

    /// Set the placeholder value
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default_value = value;
        self
    }

    /// Mark this port hidden
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Build the concrete port a new node instance starts with
    pub fn instantiate(&self) -> Port {
        Port {
            port_type: self.port_type.clone(),
            value: self.default_value.clone(),
            connected: false,
            hidden: self.hidden,
            label: Some(self.label.clone()),
        }
    }
}

/// The initial inputs and outputs of a node type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PortSchemaSet {
    #[serde(default)]
    pub inputs: Vec<PortSchema>,
    #[serde(default)]
    pub outputs: Vec<PortSchema>,
}

impl PortSchemaSet {
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    /// Concrete input ports keyed by name
    pub fn input_ports(&self) -> BTreeMap<PortName, Port> {
        self.inputs
            .iter()
            .map(|schema| (schema.name.clone(), schema.instantiate()))
            .collect()
    }

    /// Concrete output ports keyed by name
    pub fn output_ports(&self) -> BTreeMap<PortName, Port> {
        self.outputs
            .iter()
            .map(|schema| (schema.name.clone(), schema.instantiate()))
            .collect()
    }
}

/// Everything the engine knows about a node type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeDefinition {
    /// Unique type identifier (e.g., "llm-query")
    #[serde(rename = "type")]
    pub node_type: String,
    /// Category for palette grouping
    pub category: NodeCategory,
    /// Human-readable label
    pub label: String,
    /// Description of what the node does
    pub description: String,
    /// Default port schema for new instances
    #[serde(flatten)]
    pub ports: PortSchemaSet,
}

impl NodeTypeDefinition {
    /// Create a definition with no ports
    pub fn new(
        node_type: impl Into<String>,
        category: NodeCategory,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            node_type: node_type.into(),
            category,
            label: label.into(),
            description: description.into(),
            ports: PortSchemaSet::default(),
        }
    }

    /// Add an input port
    pub fn input(mut self, port: PortSchema) -> Self {
        self.ports.inputs.push(port);
        self
    }

    /// Add an output port
    pub fn output(mut self, port: PortSchema) -> Self {
        self.ports.outputs.push(port);
        self
    }
}

/// Implemented by node-type modules to describe themselves
pub trait NodeDescriptor {
    /// The static definition for this node type
    fn definition() -> NodeTypeDefinition
    where
        Self: Sized;
}

/// Link-time registration of a node type definition
pub struct DescriptorFn(pub fn() -> NodeTypeDefinition);

inventory::collect!(DescriptorFn);

#[cfg(test)]
mod tests {
    use super::*;

    fn llm_query() -> NodeTypeDefinition {
        NodeTypeDefinition::new("llm-query", NodeCategory::Ai, "LLM Query", "Ask a model")
            .input(PortSchema::new("prompt", "Prompt", PortType::Text))
            .input(
                PortSchema::new("apiKey", "API Key", PortType::Text)
                    .with_default(serde_json::json!(""))
                    .hidden(),
            )
            .output(PortSchema::new("result", "Result", PortType::Text))
    }

    #[test]
    fn test_schema_instantiates_ports() {
        let def = llm_query();
        let inputs = def.ports.input_ports();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs["prompt"].port_type, PortType::Text);
        assert!(!inputs["prompt"].connected);
        assert!(inputs["apiKey"].hidden);
        assert_eq!(inputs["apiKey"].value, serde_json::json!(""));
        assert_eq!(def.ports.output_ports()["result"].label.as_deref(), Some("Result"));
    }

    #[test]
    fn test_definition_serialization() {
        let json = serde_json::to_value(llm_query()).unwrap();
        assert_eq!(json["type"], "llm-query");
        assert_eq!(json["category"], "ai");
        assert_eq!(json["inputs"][0]["name"], "prompt");
        assert_eq!(json["outputs"][0]["type"], "text");
    }
}
