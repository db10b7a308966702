//! Core types for workflow graphs
//!
//! These types define the structure of workflow graphs, including
//! nodes, edges, ports, and the persisted workflow document.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::ids;
use crate::error::ConnectionError;

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Name of a port, unique within a node's inputs (or outputs)
pub type PortName = String;

/// The data type tag of a port.
///
/// The vocabulary is open: tags outside the well-known set are carried as
/// [`PortType::Other`] and only match themselves or `any`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PortType {
    /// Accepts any type
    #[default]
    Any,
    /// Free text
    Text,
    /// Plain string (synonym of text)
    String,
    /// Prompt text for model input
    Prompt,
    /// Numeric value
    Number,
    /// Boolean value
    Boolean,
    /// Image data
    Image,
    /// Video data
    Video,
    /// Audio data
    Audio,
    /// Any kind of media (image, video, audio)
    Media,
    /// File reference
    File,
    /// List of values
    Array,
    /// JSON object
    Object,
    /// Embedding vector
    Embedding,
    /// Model selection / handle
    Model,
    /// Any tag outside the well-known vocabulary
    Other(String),
}

impl PortType {
    /// All well-known tags, in display order
    pub const KNOWN: [PortType; 15] = [
        PortType::Any,
        PortType::Text,
        PortType::String,
        PortType::Prompt,
        PortType::Number,
        PortType::Boolean,
        PortType::Image,
        PortType::Video,
        PortType::Audio,
        PortType::Media,
        PortType::File,
        PortType::Array,
        PortType::Object,
        PortType::Embedding,
        PortType::Model,
    ];

    /// Parse a type tag (case-insensitive for well-known tags)
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "" | "any" => Self::Any,
            "text" => Self::Text,
            "string" => Self::String,
            "prompt" => Self::Prompt,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "media" => Self::Media,
            "file" => Self::File,
            "array" => Self::Array,
            "object" => Self::Object,
            "embedding" => Self::Embedding,
            "model" => Self::Model,
            _ => Self::Other(tag.trim().to_string()),
        }
    }

    /// The tag as it appears in persisted workflows
    pub fn as_str(&self) -> &str {
        match self {
            Self::Any => "any",
            Self::Text => "text",
            Self::String => "string",
            Self::Prompt => "prompt",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Media => "media",
            Self::File => "file",
            Self::Array => "array",
            Self::Object => "object",
            Self::Embedding => "embedding",
            Self::Model => "model",
            Self::Other(tag) => tag,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl From<String> for PortType {
    fn from(tag: String) -> Self {
        Self::parse(&tag)
    }
}

impl From<&str> for PortType {
    fn from(tag: &str) -> Self {
        Self::parse(tag)
    }
}

impl From<PortType> for String {
    fn from(port_type: PortType) -> Self {
        port_type.as_str().to_string()
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A named input or output slot on a node instance
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    /// Data type tag (missing tags read as `any`)
    #[serde(rename = "type", default)]
    pub port_type: PortType,
    /// Current value
    #[serde(default)]
    pub value: serde_json::Value,
    /// True while at least one edge attaches to this port
    #[serde(default)]
    pub connected: bool,
    /// Hidden ports are excluded from connections and the UI
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    /// Optional display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Port {
    /// Create a visible, unconnected port with a null value
    pub fn new(port_type: impl Into<PortType>) -> Self {
        Self {
            port_type: port_type.into(),
            ..Self::default()
        }
    }

    /// Set the initial value
    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = value;
        self
    }

    /// Mark this port hidden
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// Execution status of a node or of the whole workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

impl NodeStatus {
    /// Completed or error
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Drag-to-connect styling tag for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectStatus {
    Compatible,
    Incompatible,
}

/// 2D canvas position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The data bag of a node: ports, label, and UI/execution state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Display label
    #[serde(default)]
    pub label: String,
    /// Input ports keyed by name
    #[serde(default)]
    pub inputs: BTreeMap<PortName, Port>,
    /// Output ports keyed by name
    #[serde(default)]
    pub outputs: BTreeMap<PortName, Port>,
    /// Last known execution status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
    /// Drag-time compatibility mark
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_status: Option<ConnectStatus>,
    /// Node-type specific configuration
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A node instance in a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier for this node instance
    pub id: NodeId,
    /// Node type (key into the registry)
    #[serde(rename = "type")]
    pub node_type: String,
    /// Position on the canvas
    #[serde(default)]
    pub position: Position,
    /// Ports, label and state
    #[serde(default)]
    pub data: NodeData,
}

impl Node {
    /// Input port by name
    pub fn input(&self, name: &str) -> Option<&Port> {
        self.data.inputs.get(name)
    }

    /// Output port by name
    pub fn output(&self, name: &str) -> Option<&Port> {
        self.data.outputs.get(name)
    }

    /// Iterate over non-hidden input ports
    pub fn visible_inputs(&self) -> impl Iterator<Item = (&PortName, &Port)> {
        self.data.inputs.iter().filter(|(_, port)| !port.hidden)
    }
}

/// A directed connection from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// Source node ID
    pub source: NodeId,
    /// Target node ID
    pub target: NodeId,
    /// Source (output) port name
    pub source_handle: PortName,
    /// Target (input) port name
    pub target_handle: PortName,
}

impl Edge {
    /// Create an edge with a fresh id
    pub fn new(
        source: impl Into<NodeId>,
        source_handle: impl Into<PortName>,
        target: impl Into<NodeId>,
        target_handle: impl Into<PortName>,
    ) -> Self {
        Self {
            id: format!("{}-{}", ids::EDGE_PREFIX, uuid::Uuid::new_v4()),
            source: source.into(),
            target: target.into(),
            source_handle: source_handle.into(),
            target_handle: target_handle.into(),
        }
    }

    /// True if either endpoint is the given node
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Which side of a node a port lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    /// Handle prefix, e.g. `input-`
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Input => "input-",
            Self::Output => "output-",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

/// String-encoded port references (`input-<name>` / `output-<name>`)
pub struct Handle;

impl Handle {
    /// Encode an input handle
    pub fn input(name: &str) -> String {
        format!("{}{}", PortDirection::Input.prefix(), name)
    }

    /// Encode an output handle
    pub fn output(name: &str) -> String {
        format!("{}{}", PortDirection::Output.prefix(), name)
    }

    /// Decode a handle into a port name for the expected direction.
    ///
    /// Bare names without a prefix are accepted as-is; a handle carrying the
    /// opposite prefix is rejected.
    pub fn port_name(handle: &str, direction: PortDirection) -> Result<&str, ConnectionError> {
        let other = match direction {
            PortDirection::Input => PortDirection::Output,
            PortDirection::Output => PortDirection::Input,
        };
        if let Some(name) = handle.strip_prefix(direction.prefix()) {
            if name.is_empty() {
                return Err(ConnectionError::InvalidHandle(handle.to_string()));
            }
            return Ok(name);
        }
        if handle.is_empty() || handle.starts_with(other.prefix()) {
            return Err(ConnectionError::InvalidHandle(handle.to_string()));
        }
        Ok(handle)
    }
}

/// The node and edge sets of one workflow
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowGraph {
    /// Nodes in the graph
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Edges connecting nodes
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find a node by ID (mutable)
    pub fn find_node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Find an edge by ID
    pub fn find_edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Get edges coming into a node
    pub fn incoming_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Get edges going out of a node
    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// The edge currently feeding an input port, if any
    pub fn edge_into(&self, node_id: &str, port: &str) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.target == node_id && e.target_handle == port)
    }

    /// Distinct upstream node IDs, in edge order
    pub fn get_dependencies(&self, node_id: &str) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.incoming_edges(node_id)
            .filter(|e| seen.insert(e.source.as_str()))
            .map(|e| e.source.clone())
            .collect()
    }

    /// Distinct downstream node IDs, in edge order
    pub fn get_dependents(&self, node_id: &str) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.outgoing_edges(node_id)
            .filter(|e| seen.insert(e.target.as_str()))
            .map(|e| e.target.clone())
            .collect()
    }

    /// Nodes with no incoming edge, in node order
    pub fn entry_nodes(&self) -> Vec<NodeId> {
        let targets: HashSet<&str> = self.edges.iter().map(|e| e.target.as_str()).collect();
        self.nodes
            .iter()
            .filter(|n| !targets.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect()
    }

    /// Recompute every port's `connected` flag from the edge set
    pub fn sync_connection_flags(&mut self) {
        let sources: HashSet<(String, String)> = self
            .edges
            .iter()
            .map(|e| (e.source.clone(), e.source_handle.clone()))
            .collect();
        let targets: HashSet<(String, String)> = self
            .edges
            .iter()
            .map(|e| (e.target.clone(), e.target_handle.clone()))
            .collect();

        for node in &mut self.nodes {
            for (name, port) in node.data.outputs.iter_mut() {
                port.connected = sources.contains(&(node.id.clone(), name.clone()));
            }
            for (name, port) in node.data.inputs.iter_mut() {
                port.connected = targets.contains(&(node.id.clone(), name.clone()));
            }
        }
    }
}

/// A persisted workflow document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Nodes and edges, flattened into the document
    #[serde(flatten)]
    pub graph: WorkflowGraph,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Create an empty workflow with a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("{}-{}", ids::WORKFLOW_PREFIX, uuid::Uuid::new_v4()),
            name: name.into(),
            description: None,
            graph: WorkflowGraph::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
