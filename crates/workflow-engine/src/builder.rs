//! Fluent builder for workflow graphs
//!
//! Provides a fluent API for constructing graphs programmatically, mostly
//! for tests and for hosts that generate workflows from code.

use crate::registry::NodeRegistry;
use crate::types::{Edge, Node, NodeData, Port, PortType, Position, Workflow, WorkflowGraph};

/// Fluent builder for constructing workflow graphs
///
/// # Example
///
/// ```ignore
/// let graph = WorkflowBuilder::new()
///     .add_node("input-1", "text-input", (0.0, 0.0))
///     .output("text", PortType::Text)
///     .add_node("output-1", "text-output", (200.0, 0.0))
///     .input("text", PortType::Text)
///     .add_edge("input-1", "text", "output-1", "text")
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct WorkflowBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    edge_counter: usize,
}

impl WorkflowBuilder {
    /// Create a new workflow builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with no ports
    pub fn add_node(
        mut self,
        id: impl Into<String>,
        node_type: impl Into<String>,
        position: (f64, f64),
    ) -> Self {
        let id = id.into();
        self.nodes.push(Node {
            data: NodeData {
                label: id.clone(),
                ..NodeData::default()
            },
            id,
            node_type: node_type.into(),
            position: Position::new(position.0, position.1),
        });
        self
    }

    /// Add a node whose ports come from the registry's default schema
    pub fn add_registered_node(
        mut self,
        registry: &NodeRegistry,
        id: impl Into<String>,
        node_type: impl Into<String>,
        position: (f64, f64),
    ) -> Self {
        let node_type = node_type.into();
        let (inputs, outputs) = registry.instantiate_ports(&node_type);
        let label = registry
            .lookup(&node_type)
            .map(|d| d.label.clone())
            .unwrap_or_else(|| node_type.clone());
        self.nodes.push(Node {
            id: id.into(),
            node_type,
            position: Position::new(position.0, position.1),
            data: NodeData {
                label,
                inputs,
                outputs,
                ..NodeData::default()
            },
        });
        self
    }

    /// Add an input port to the most recently added node
    pub fn input(self, name: impl Into<String>, port_type: impl Into<PortType>) -> Self {
        self.with_input(name, Port::new(port_type))
    }

    /// Add an input port carrying a value to the most recently added node
    pub fn input_value(
        self,
        name: impl Into<String>,
        port_type: impl Into<PortType>,
        value: serde_json::Value,
    ) -> Self {
        self.with_input(name, Port::new(port_type).with_value(value))
    }

    /// Add a hidden input port to the most recently added node
    pub fn hidden_input(self, name: impl Into<String>, port_type: impl Into<PortType>) -> Self {
        self.with_input(name, Port::new(port_type).hidden())
    }

    fn with_input(mut self, name: impl Into<String>, port: Port) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.data.inputs.insert(name.into(), port);
        }
        self
    }

    /// Add an output port to the most recently added node
    pub fn output(mut self, name: impl Into<String>, port_type: impl Into<PortType>) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.data.outputs.insert(name.into(), Port::new(port_type));
        }
        self
    }

    /// Set extra data on the most recently added node
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.data.extra.insert(key.into(), value);
        }
        self
    }

    /// Add an edge between two nodes (auto-generates edge ID)
    pub fn add_edge(
        mut self,
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        self.edge_counter += 1;
        let id = format!("edge-{}", self.edge_counter);
        self.add_edge_with_id(id, source, source_port, target, target_port)
    }

    /// Add an edge with an explicit ID
    pub fn add_edge_with_id(
        mut self,
        edge_id: impl Into<String>,
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        self.edges.push(Edge {
            id: edge_id.into(),
            source: source.into(),
            source_handle: source_port.into(),
            target: target.into(),
            target_handle: target_port.into(),
        });
        self
    }

    /// Build the graph without validation; `connected` flags are synced
    pub fn build(self) -> WorkflowGraph {
        let mut graph = WorkflowGraph {
            nodes: self.nodes,
            edges: self.edges,
        };
        graph.sync_connection_flags();
        graph
    }

    /// Build a named workflow document around the graph
    pub fn build_workflow(self, name: impl Into<String>) -> Workflow {
        let mut workflow = Workflow::new(name);
        workflow.graph = self.build();
        workflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{NodeCategory, NodeTypeDefinition, PortSchema};

    #[test]
    fn test_workflow_builder() {
        let graph = WorkflowBuilder::new()
            .add_node("a", "text-input", (0.0, 0.0))
            .output("text", PortType::Text)
            .with_data("placeholder", serde_json::json!("Type here"))
            .add_node("b", "text-output", (200.0, 0.0))
            .input("text", PortType::Text)
            .input_value("prefix", "text", serde_json::json!("> "))
            .add_edge("a", "text", "b", "text")
            .build();

        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].id, "edge-1");
        assert_eq!(graph.nodes[0].data.extra["placeholder"], "Type here");

        let b = graph.find_node("b").unwrap();
        assert!(b.data.inputs["text"].connected);
        assert!(!b.data.inputs["prefix"].connected);
        assert_eq!(b.data.inputs["prefix"].value, "> ");
        assert!(graph.find_node("a").unwrap().data.outputs["text"].connected);
    }

    #[test]
    fn test_registered_node_uses_default_schema() {
        let mut registry = NodeRegistry::new();
        registry.register(
            NodeTypeDefinition::new("text-input", NodeCategory::Input, "Text Input", "")
                .output(PortSchema::new("text", "Text", PortType::Text)),
        );

        let graph = WorkflowBuilder::new()
            .add_registered_node(&registry, "a", "text-input", (0.0, 0.0))
            .add_registered_node(&registry, "z", "mystery", (0.0, 0.0))
            .build();

        assert_eq!(graph.nodes[0].data.label, "Text Input");
        assert!(graph.nodes[0].output("text").is_some());
        assert!(graph.nodes[1].data.outputs.is_empty());
        assert_eq!(graph.nodes[1].data.label, "mystery");
    }
}
