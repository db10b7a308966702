//! Graph store
//!
//! The single owner of a workflow's node and edge sets. Every mutation is a
//! synchronous, whole-operation update: callers never observe a half-applied
//! change, and the invariants below hold between any two calls.
//!
//! - Every edge's endpoints exist (removing a node cascades to its edges).
//! - Every edge passes the connection validator. New edges are checked on
//!   the way in; a node edit or a loaded document drops the edges that no
//!   longer pass.
//! - Port `connected` flags match the edge set.
//!
//! Committed mutations push an undo snapshot. UI-only state (selection,
//! drag marks, execution status) does not.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compatibility::CompatibilityMatrix;
use crate::config::{EngineConfig, UnknownTypePolicy};
use crate::constants::defaults;
use crate::coordinator::ExecutionState;
use crate::error::{ConnectionError, NodeEngineError, Result};
use crate::history::GraphHistory;
use crate::registry::NodeRegistry;
use crate::types::{
    Edge, EdgeId, Handle, Node, NodeData, NodeId, PortDirection, PortName, Position, Workflow,
    WorkflowGraph,
};
use crate::validation::{self, PortRef};

/// Partial update for an edge; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgeUpdate {
    pub source: Option<NodeId>,
    pub source_handle: Option<PortName>,
    pub target: Option<NodeId>,
    pub target_handle: Option<PortName>,
}

/// Read-only view handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub selected: Option<NodeId>,
    pub execution: Option<ExecutionState>,
    pub can_undo: bool,
    pub can_redo: bool,
}

/// In-memory owner of one workflow graph
pub struct GraphStore {
    graph: WorkflowGraph,
    selected: Option<NodeId>,
    drag_source: Option<PortRef>,
    execution: Option<ExecutionState>,
    registry: Arc<NodeRegistry>,
    matrix: Arc<CompatibilityMatrix>,
    unknown_types: UnknownTypePolicy,
    history: GraphHistory,
    /// Metadata of the loaded document, graph left empty
    document: Option<Workflow>,
}

impl GraphStore {
    /// Create an empty store using the standard compatibility matrix
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self::build(
            registry,
            defaults::HISTORY_LIMIT,
            UnknownTypePolicy::default(),
        )
    }

    /// Create an empty store honouring the editing settings in `config`
    pub fn from_config(registry: Arc<NodeRegistry>, config: &EngineConfig) -> Self {
        Self::build(registry, config.history_limit, config.unknown_node_types)
    }

    fn build(registry: Arc<NodeRegistry>, history_limit: usize, policy: UnknownTypePolicy) -> Self {
        let mut store = Self {
            graph: WorkflowGraph::new(),
            selected: None,
            drag_source: None,
            execution: None,
            registry,
            matrix: Arc::new(CompatibilityMatrix::standard()),
            unknown_types: policy,
            history: GraphHistory::new(history_limit),
            document: None,
        };
        store.reset_history();
        store
    }

    /// Use a custom compatibility matrix
    pub fn with_matrix(mut self, matrix: Arc<CompatibilityMatrix>) -> Self {
        self.matrix = matrix;
        self
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn matrix(&self) -> &CompatibilityMatrix {
        &self.matrix
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn nodes(&self) -> &[Node] {
        &self.graph.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.graph.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.graph.find_node(id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.graph.find_edge(id)
    }

    /// The currently selected node id
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Current nodes, edges, selection and last applied execution state
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.graph.nodes.clone(),
            edges: self.graph.edges.clone(),
            selected: self.selected.clone(),
            execution: self.execution.clone(),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        }
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Instantiate a node of `node_type` from its default schema.
    ///
    /// Unknown types produce a port-less node unless the store was built
    /// with [`UnknownTypePolicy::Reject`].
    pub fn add_node(&mut self, node_type: &str, position: Position) -> Result<Node> {
        let label = match self.registry.lookup(node_type) {
            Some(definition) => definition.label.clone(),
            None if self.unknown_types == UnknownTypePolicy::Reject => {
                return Err(NodeEngineError::UnknownNodeType(node_type.to_string()));
            }
            None => {
                log::warn!("Unknown node type '{}'; adding node without ports", node_type);
                node_type.to_string()
            }
        };
        let (inputs, outputs) = self.registry.instantiate_ports(node_type);

        let node = Node {
            id: format!("{}-{}", node_type, uuid::Uuid::new_v4()),
            node_type: node_type.to_string(),
            position,
            data: NodeData {
                label,
                inputs,
                outputs,
                ..NodeData::default()
            },
        };
        self.graph.nodes.push(node.clone());
        log::debug!("Added node '{}'", node.id);
        self.record()?;
        Ok(node)
    }

    /// Shallow-merge `patch` into a node's data.
    ///
    /// Returns false if the node does not exist. Edges the merged ports no
    /// longer support (port dropped, hidden, or retyped out of
    /// compatibility) are removed.
    pub fn update_node(
        &mut self,
        id: &str,
        patch: serde_json::Map<String, serde_json::Value>,
    ) -> Result<bool> {
        let Some(node) = self.graph.find_node_mut(id) else {
            return Ok(false);
        };

        let mut data = serde_json::to_value(&node.data)?;
        if let serde_json::Value::Object(fields) = &mut data {
            fields.extend(patch);
        }
        node.data = serde_json::from_value(data)?;

        for (edge, reason) in validation::retain_valid_edges(&mut self.graph, &self.matrix) {
            log::debug!("Update of node '{}' dropped edge '{}': {}", id, edge.id, reason);
        }
        self.graph.sync_connection_flags();
        self.record()?;
        Ok(true)
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, id: &str) -> Result<bool> {
        let before = self.graph.nodes.len();
        self.graph.nodes.retain(|n| n.id != id);
        if self.graph.nodes.len() == before {
            return Ok(false);
        }

        let edges_before = self.graph.edges.len();
        self.graph.edges.retain(|e| !e.touches(id));
        log::debug!(
            "Removed node '{}' and {} edge(s)",
            id,
            edges_before - self.graph.edges.len()
        );

        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        self.graph.sync_connection_flags();
        self.record()?;
        Ok(true)
    }

    /// Select a node, or clear the selection with `None`.
    ///
    /// Returns false (and leaves the selection alone) for an unknown id.
    pub fn select_node(&mut self, id: Option<&str>) -> bool {
        match id {
            None => {
                self.selected = None;
                true
            }
            Some(id) if self.graph.find_node(id).is_some() => {
                self.selected = Some(id.to_string());
                true
            }
            Some(_) => false,
        }
    }

    pub fn move_node(&mut self, id: &str, position: Position) -> Result<bool> {
        let Some(node) = self.graph.find_node_mut(id) else {
            return Ok(false);
        };
        node.position = position;
        self.record()?;
        Ok(true)
    }

    /// Set the value of an input port; false if the node or port is missing
    pub fn set_input_value(
        &mut self,
        node_id: &str,
        port: &str,
        value: serde_json::Value,
    ) -> Result<bool> {
        let Some(input) = self
            .graph
            .find_node_mut(node_id)
            .and_then(|n| n.data.inputs.get_mut(port))
        else {
            return Ok(false);
        };
        input.value = value;
        self.record()?;
        Ok(true)
    }

    // =========================================================================
    // Edges
    // =========================================================================

    /// Validate and commit an edge between two handles.
    ///
    /// Handles may be prefixed (`output-text`, `input-prompt`) or bare port
    /// names.
    pub fn connect(
        &mut self,
        source: &str,
        source_handle: &str,
        target: &str,
        target_handle: &str,
    ) -> Result<Edge> {
        let source_port = Handle::port_name(source_handle, PortDirection::Output)?;
        let target_port = Handle::port_name(target_handle, PortDirection::Input)?;
        self.add_edge(Edge::new(source, source_port, target, target_port))
    }

    /// Commit a fully specified edge after validating it
    pub fn add_edge(&mut self, edge: Edge) -> Result<Edge> {
        if self.graph.find_edge(&edge.id).is_some() {
            return Err(NodeEngineError::DuplicateEdge(edge.id));
        }
        validation::validate_connection(
            &self.graph,
            &self.matrix,
            &PortRef::new(edge.source.as_str(), edge.source_handle.as_str()),
            &PortRef::new(edge.target.as_str(), edge.target_handle.as_str()),
        )?;

        self.graph.edges.push(edge.clone());
        self.graph.sync_connection_flags();
        log::debug!(
            "Connected {}.{} -> {}.{}",
            edge.source,
            edge.source_handle,
            edge.target,
            edge.target_handle
        );
        self.record()?;
        Ok(edge)
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<bool> {
        let before = self.graph.edges.len();
        self.graph.edges.retain(|e| e.id != id);
        if self.graph.edges.len() == before {
            return Ok(false);
        }
        log::debug!("Removed edge '{}'", id);
        self.graph.sync_connection_flags();
        self.record()?;
        Ok(true)
    }

    /// Re-point an edge. The new endpoints are validated as if the edge
    /// were being added, ignoring the edge itself.
    pub fn update_edge(&mut self, id: &str, update: EdgeUpdate) -> Result<bool> {
        let Some(current) = self.graph.find_edge(id) else {
            return Ok(false);
        };
        let mut next = current.clone();
        if let Some(source) = update.source {
            next.source = source;
        }
        if let Some(handle) = update.source_handle {
            next.source_handle = Handle::port_name(&handle, PortDirection::Output)?.to_string();
        }
        if let Some(target) = update.target {
            next.target = target;
        }
        if let Some(handle) = update.target_handle {
            next.target_handle = Handle::port_name(&handle, PortDirection::Input)?.to_string();
        }
        if &next == current {
            return Ok(true);
        }

        validation::validate_connection_ignoring(
            &self.graph,
            &self.matrix,
            &PortRef::new(next.source.as_str(), next.source_handle.as_str()),
            &PortRef::new(next.target.as_str(), next.target_handle.as_str()),
            Some(id),
        )?;

        if let Some(edge) = self.graph.edges.iter_mut().find(|e| e.id == id) {
            *edge = next;
        }
        self.graph.sync_connection_flags();
        self.record()?;
        Ok(true)
    }

    /// Would an edge between these handles be accepted?
    pub fn validate_connection(
        &self,
        source_node_id: &str,
        target_node_id: &str,
        source_handle: &str,
        target_handle: &str,
    ) -> bool {
        self.check_connection(source_node_id, target_node_id, source_handle, target_handle)
            .is_ok()
    }

    /// Same as [`validate_connection`](Self::validate_connection), with the
    /// rejection reason
    pub fn check_connection(
        &self,
        source_node_id: &str,
        target_node_id: &str,
        source_handle: &str,
        target_handle: &str,
    ) -> std::result::Result<(), ConnectionError> {
        let source_port = Handle::port_name(source_handle, PortDirection::Output)?;
        let target_port = Handle::port_name(target_handle, PortDirection::Input)?;
        validation::validate_connection(
            &self.graph,
            &self.matrix,
            &PortRef::new(source_node_id, source_port),
            &PortRef::new(target_node_id, target_port),
        )
    }

    // =========================================================================
    // Drag-to-connect
    // =========================================================================

    /// Mark every node with whether it can accept the dragged output.
    ///
    /// Returns false (and clears all marks) if the handle does not resolve
    /// to a visible output port.
    pub fn begin_drag(&mut self, node_id: &str, source_handle: &str) -> bool {
        let Ok(port) = Handle::port_name(source_handle, PortDirection::Output) else {
            self.end_drag();
            return false;
        };
        let active = PortRef::new(node_id, port);
        let index = self.matrix.index();
        validation::mark_compatibility(&mut self.graph, &index, Some(&active));

        let resolved = self
            .graph
            .find_node(node_id)
            .and_then(|n| n.output(&active.port))
            .is_some_and(|p| !p.hidden);
        self.drag_source = resolved.then_some(active);
        resolved
    }

    /// Clear all drag marks
    pub fn end_drag(&mut self) {
        self.drag_source = None;
        validation::clear_compatibility(&mut self.graph);
    }

    /// The output port being dragged, if any
    pub fn drag_source(&self) -> Option<&PortRef> {
        self.drag_source.as_ref()
    }

    // =========================================================================
    // Execution display
    // =========================================================================

    /// Copy per-node statuses from a run into node data for rendering
    pub fn apply_execution_state(&mut self, state: &ExecutionState) {
        for node in &mut self.graph.nodes {
            node.data.status = state.nodes.get(&node.id).map(|n| n.status);
        }
        self.execution = Some(state.clone());
    }

    // =========================================================================
    // Documents and history
    // =========================================================================

    /// Replace the graph with a persisted workflow's nodes and edges.
    ///
    /// Edges the connection validator rejects (missing endpoints, hidden or
    /// incompatible ports, a second edge into one input) are dropped with a
    /// warning. Selection, drag marks, execution display and history are
    /// reset.
    pub fn load(&mut self, workflow: &Workflow) {
        self.graph = workflow.graph.clone();
        for (edge, reason) in validation::retain_valid_edges(&mut self.graph, &self.matrix) {
            log::warn!(
                "Dropping edge '{}' from workflow '{}': {}",
                edge.id,
                workflow.id,
                reason
            );
        }
        self.graph.sync_connection_flags();
        validation::clear_compatibility(&mut self.graph);
        self.selected = None;
        self.drag_source = None;
        self.execution = None;
        self.document = Some(Workflow {
            id: workflow.id.clone(),
            name: workflow.name.clone(),
            description: workflow.description.clone(),
            graph: WorkflowGraph::new(),
            created_at: workflow.created_at,
            updated_at: workflow.updated_at,
        });
        self.reset_history();
        log::debug!(
            "Loaded workflow '{}' ({} nodes, {} edges)",
            workflow.id,
            self.graph.nodes.len(),
            self.graph.edges.len()
        );
    }

    /// The current graph as a workflow document.
    ///
    /// Saving back under the id of the loaded document keeps its
    /// description and timestamps; any other id starts a new document.
    pub fn to_workflow(&self, id: impl Into<String>, name: impl Into<String>) -> Workflow {
        let id = id.into();
        let mut workflow = match &self.document {
            Some(document) if document.id == id => document.clone(),
            _ => Workflow::new(""),
        };
        workflow.id = id;
        workflow.name = name.into();
        workflow.graph = self.graph.clone();
        validation::clear_compatibility(&mut workflow.graph);
        workflow
    }

    /// Step back one committed mutation; false if there is nothing to undo
    pub fn undo(&mut self) -> Result<bool> {
        match self.history.undo(&mut self.selected)? {
            Some(graph) => {
                self.restore(graph);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Re-apply an undone mutation; false if there is nothing to redo
    pub fn redo(&mut self) -> Result<bool> {
        match self.history.redo(&mut self.selected)? {
            Some(graph) => {
                self.restore(graph);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Swap in a graph from history, keeping the last run's statuses on
    /// the nodes that are still present
    fn restore(&mut self, graph: WorkflowGraph) {
        self.graph = graph;
        self.drag_source = None;
        if let Some(state) = &self.execution {
            for node in &mut self.graph.nodes {
                node.data.status = state.nodes.get(&node.id).map(|n| n.status);
            }
        }
    }

    fn record(&mut self) -> Result<()> {
        self.history.record(&self.graph)?;
        Ok(())
    }

    fn reset_history(&mut self) {
        if let Err(e) = self.history.reset(&self.graph) {
            log::warn!("Could not snapshot graph for undo: {}", e);
        }
    }
}

/// Ids of every edge touching `node_id`
pub fn edges_touching(graph: &WorkflowGraph, node_id: &str) -> Vec<EdgeId> {
    graph
        .edges
        .iter()
        .filter(|e| e.touches(node_id))
        .map(|e| e.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::NodeExecutionState;
    use crate::descriptor::{NodeCategory, NodeTypeDefinition, PortSchema};
    use crate::types::{ConnectStatus, NodeStatus, PortType};

    fn test_registry() -> Arc<NodeRegistry> {
        let mut registry = NodeRegistry::new();
        registry.register(
            NodeTypeDefinition::new("text-input", NodeCategory::Input, "Text Input", "")
                .output(PortSchema::new("text", "Text", PortType::Text)),
        );
        registry.register(
            NodeTypeDefinition::new("llm-query", NodeCategory::Ai, "LLM Query", "")
                .input(PortSchema::new("prompt", "Prompt", PortType::Text))
                .input(PortSchema::new("apiKey", "API Key", PortType::Text).hidden())
                .output(PortSchema::new("result", "Result", PortType::Text)),
        );
        registry.register(
            NodeTypeDefinition::new("text-output", NodeCategory::Output, "Text Output", "")
                .input(PortSchema::new("text", "Text", PortType::Any)),
        );
        registry.register(
            NodeTypeDefinition::new("image-input", NodeCategory::Input, "Image Input", "")
                .output(PortSchema::new("image", "Image", PortType::Image)),
        );
        registry.register(
            NodeTypeDefinition::new("calculator", NodeCategory::Data, "Calculator", "")
                .input(PortSchema::new("value", "Value", PortType::Number)),
        );
        registry.register(
            NodeTypeDefinition::new("image-output", NodeCategory::Output, "Image Output", "")
                .input(PortSchema::new("media", "Media", PortType::Media)),
        );
        Arc::new(registry)
    }

    fn store() -> GraphStore {
        GraphStore::new(test_registry())
    }

    fn add(store: &mut GraphStore, node_type: &str) -> String {
        store.add_node(node_type, Position::default()).unwrap().id
    }

    #[test]
    fn test_add_node_uses_default_schema() {
        let mut store = store();
        let node = store.add_node("llm-query", Position::new(10.0, 20.0)).unwrap();

        assert!(node.id.starts_with("llm-query-"));
        assert_eq!(node.data.label, "LLM Query");
        assert_eq!(node.data.inputs.len(), 2);
        assert!(node.data.inputs["apiKey"].hidden);
        assert_eq!(node.data.outputs["result"].port_type, PortType::Text);
        assert_eq!(store.nodes().len(), 1);

        let other = store.add_node("llm-query", Position::default()).unwrap();
        assert_ne!(node.id, other.id);
    }

    #[test]
    fn test_unknown_type_policy() {
        let mut store = store();
        let node = store.add_node("mystery", Position::default()).unwrap();
        assert!(node.data.inputs.is_empty() && node.data.outputs.is_empty());

        let config = EngineConfig {
            unknown_node_types: UnknownTypePolicy::Reject,
            ..EngineConfig::default()
        };
        let mut strict = GraphStore::from_config(test_registry(), &config);
        assert!(matches!(
            strict.add_node("mystery", Position::default()),
            Err(NodeEngineError::UnknownNodeType(_))
        ));
        assert!(strict.nodes().is_empty());
    }

    #[test]
    fn test_chain_connects_and_flags_ports() {
        let mut store = store();
        let a = add(&mut store, "text-input");
        let b = add(&mut store, "llm-query");
        let c = add(&mut store, "text-output");

        assert!(store.validate_connection(&a, &b, "output-text", "input-prompt"));
        store.connect(&a, "output-text", &b, "input-prompt").unwrap();
        assert!(store.validate_connection(&b, &c, "output-result", "input-text"));
        store.connect(&b, "result", &c, "text").unwrap();

        assert_eq!(store.edges().len(), 2);
        assert_eq!(store.graph().entry_nodes(), vec![a.clone()]);
        assert!(store.node(&a).unwrap().data.outputs["text"].connected);
        assert!(store.node(&b).unwrap().data.inputs["prompt"].connected);
        assert!(!store.node(&b).unwrap().data.inputs["apiKey"].connected);
    }

    #[test]
    fn test_incompatible_edge_is_never_added() {
        let mut store = store();
        let d = add(&mut store, "image-input");
        let e = add(&mut store, "calculator");

        assert!(!store.validate_connection(&d, &e, "output-image", "input-value"));
        let err = store.connect(&d, "output-image", &e, "input-value").unwrap_err();
        assert!(matches!(
            err,
            NodeEngineError::Connection(ConnectionError::IncompatibleTypes { .. })
        ));
        assert!(store.edges().is_empty());
        assert!(!store.node(&d).unwrap().data.outputs["image"].connected);
    }

    #[test]
    fn test_second_edge_into_input_fails() {
        let mut store = store();
        let a = add(&mut store, "text-input");
        let x = add(&mut store, "text-input");
        let b = add(&mut store, "llm-query");
        store.connect(&a, "output-text", &b, "input-prompt").unwrap();

        let reason = store
            .check_connection(&x, &b, "output-text", "input-prompt")
            .unwrap_err()
            .to_string();
        assert_eq!(
            reason,
            format!("input 'prompt' on node '{}' is already connected", b)
        );

        // Direct edge insertion is validated as well
        let err = store
            .add_edge(Edge::new(x.as_str(), "text", b.as_str(), "prompt"))
            .unwrap_err();
        assert!(matches!(
            err,
            NodeEngineError::Connection(ConnectionError::AlreadyConnected { .. })
        ));
        assert_eq!(store.edges().len(), 1);
    }

    #[test]
    fn test_handles_are_checked() {
        let mut store = store();
        let a = add(&mut store, "text-input");
        let b = add(&mut store, "llm-query");
        assert!(!store.validate_connection(&a, &b, "input-text", "input-prompt"));
        assert!(!store.validate_connection(&a, &b, "output-text", "input-apiKey"));
        assert!(matches!(
            store.connect(&a, "output-text", &b, "output-result"),
            Err(NodeEngineError::Connection(ConnectionError::InvalidHandle(_)))
        ));
    }

    #[test]
    fn test_remove_node_cascades_only_touching_edges() {
        let mut store = store();
        let a = add(&mut store, "text-input");
        let b = add(&mut store, "llm-query");
        let c = add(&mut store, "text-output");
        let x = add(&mut store, "text-input");
        let y = add(&mut store, "text-output");
        store.connect(&a, "text", &b, "prompt").unwrap();
        store.connect(&b, "result", &c, "text").unwrap();
        let kept = store.connect(&x, "text", &y, "text").unwrap();
        store.select_node(Some(&b));

        assert_eq!(edges_touching(store.graph(), &b).len(), 2);
        assert!(store.remove_node(&b).unwrap());
        assert_eq!(store.edges(), &[kept]);
        assert!(!store.node(&a).unwrap().data.outputs["text"].connected);
        assert!(!store.node(&c).unwrap().data.inputs["text"].connected);
        assert_eq!(store.selected(), None);

        assert!(!store.remove_node("ghost").unwrap());
    }

    #[test]
    fn test_update_node_merges_and_prunes() {
        let mut store = store();
        let a = add(&mut store, "text-input");
        let b = add(&mut store, "llm-query");
        store.connect(&a, "text", &b, "prompt").unwrap();

        let patch = serde_json::json!({"label": "Ask", "model": "gpt-4"});
        assert!(store
            .update_node(&b, patch.as_object().cloned().unwrap())
            .unwrap());
        let node = store.node(&b).unwrap();
        assert_eq!(node.data.label, "Ask");
        assert_eq!(node.data.extra["model"], "gpt-4");
        assert_eq!(node.data.inputs.len(), 2);
        assert_eq!(store.edges().len(), 1);

        // Replacing the inputs drops the prompt port and its edge
        let patch = serde_json::json!({"inputs": {"question": {"type": "text"}}});
        store
            .update_node(&b, patch.as_object().cloned().unwrap())
            .unwrap();
        assert!(store.edges().is_empty());
        assert!(!store.node(&a).unwrap().data.outputs["text"].connected);

        assert!(!store
            .update_node("ghost", serde_json::Map::new())
            .unwrap());
    }

    #[test]
    fn test_update_edge_revalidates() {
        let mut store = store();
        let a = add(&mut store, "text-input");
        let b = add(&mut store, "llm-query");
        let c = add(&mut store, "text-output");
        let d = add(&mut store, "image-input");
        let edge = store.connect(&a, "text", &b, "prompt").unwrap();

        // Same target port: the edge does not block itself
        let moved = store
            .update_edge(
                &edge.id,
                EdgeUpdate {
                    target: Some(c.clone()),
                    target_handle: Some("input-text".to_string()),
                    ..EdgeUpdate::default()
                },
            )
            .unwrap();
        assert!(moved);
        assert_eq!(store.edge(&edge.id).unwrap().target, c);
        assert!(!store.node(&b).unwrap().data.inputs["prompt"].connected);

        let err = store
            .update_edge(
                &edge.id,
                EdgeUpdate {
                    source: Some(d.clone()),
                    source_handle: Some("image".to_string()),
                    target: Some(b.clone()),
                    target_handle: Some("prompt".to_string()),
                },
            )
            .unwrap_err();
        assert!(matches!(err, NodeEngineError::Connection(_)));
        assert_eq!(store.edge(&edge.id).unwrap().target, c);

        assert!(!store.update_edge("ghost", EdgeUpdate::default()).unwrap());
    }

    #[test]
    fn test_undo_redo() {
        let mut store = store();
        let a = add(&mut store, "text-input");
        let b = add(&mut store, "llm-query");
        store.connect(&a, "text", &b, "prompt").unwrap();
        store.select_node(Some(&b));

        assert!(store.undo().unwrap());
        assert!(store.edges().is_empty());
        assert!(store.undo().unwrap());
        assert!(store.node(&b).is_none());
        assert_eq!(store.selected(), None);

        assert!(store.redo().unwrap());
        assert!(store.redo().unwrap());
        assert_eq!(store.edges().len(), 1);
        assert!(!store.redo().unwrap());

        assert!(store.undo().unwrap());
        assert!(store.undo().unwrap());
        assert!(store.undo().unwrap());
        assert!(store.nodes().is_empty());
        assert!(!store.undo().unwrap());
    }

    #[test]
    fn test_drag_marks() {
        let mut store = store();
        let d = add(&mut store, "image-input");
        let viewer = add(&mut store, "image-output");
        let calc = add(&mut store, "calculator");

        assert!(store.begin_drag(&d, "output-image"));
        let status = |s: &GraphStore, id: &str| s.node(id).unwrap().data.connect_status;
        assert_eq!(status(&store, &viewer), Some(ConnectStatus::Compatible));
        assert_eq!(status(&store, &calc), Some(ConnectStatus::Incompatible));
        assert_eq!(status(&store, &d), None);
        assert!(store.drag_source().is_some());

        store.end_drag();
        assert!(store.nodes().iter().all(|n| n.data.connect_status.is_none()));

        assert!(!store.begin_drag(&d, "output-nothing"));
        assert!(store.nodes().iter().all(|n| n.data.connect_status.is_none()));
    }

    #[test]
    fn test_apply_execution_state() {
        let mut store = store();
        let a = add(&mut store, "text-input");
        let b = add(&mut store, "text-output");

        let mut state = ExecutionState {
            status: NodeStatus::Running,
            ..ExecutionState::default()
        };
        state.nodes.insert(
            a.clone(),
            NodeExecutionState {
                status: NodeStatus::Completed,
                ..NodeExecutionState::default()
            },
        );
        store.apply_execution_state(&state);

        assert_eq!(store.node(&a).unwrap().data.status, Some(NodeStatus::Completed));
        assert_eq!(store.node(&b).unwrap().data.status, None);
        assert_eq!(store.snapshot().execution, Some(state.clone()));

        // Statuses are display state: not an edit, and kept across undo
        assert!(store.remove_node(&b).unwrap());
        assert!(store.undo().unwrap());
        assert_eq!(store.node(&a).unwrap().data.status, Some(NodeStatus::Completed));
        assert!(store.node(&b).is_some());
    }

    #[test]
    fn test_load_and_to_workflow() {
        let mut store = store();
        let a = add(&mut store, "text-input");
        let b = add(&mut store, "text-output");
        store.connect(&a, "text", &b, "text").unwrap();
        store.set_input_value(&b, "text", serde_json::json!("fallback")).unwrap();
        store.move_node(&b, Position::new(200.0, 40.0)).unwrap();

        let workflow = store.to_workflow("workflow-1", "Demo");
        assert_eq!(workflow.id, "workflow-1");
        assert_eq!(workflow.graph.nodes.len(), 2);

        let mut other = GraphStore::new(test_registry());
        other.load(&workflow);
        assert_eq!(other.graph(), store.graph());
        assert_eq!(other.node(&b).unwrap().position, Position::new(200.0, 40.0));
        assert!(!other.can_undo());

        let snapshot = other.snapshot();
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.edges.len(), 1);
        assert!(!snapshot.can_redo);
    }

    #[test]
    fn test_update_node_drops_edges_it_invalidates() {
        let mut store = store();
        let a = add(&mut store, "text-input");
        let b = add(&mut store, "llm-query");
        let c = add(&mut store, "text-output");
        store.connect(&a, "text", &b, "prompt").unwrap();
        store.connect(&b, "result", &c, "text").unwrap();

        // Same port name, now hidden
        let patch = serde_json::json!({
            "inputs": {"prompt": {"type": "text", "hidden": true}}
        });
        store
            .update_node(&b, patch.as_object().cloned().unwrap())
            .unwrap();
        assert_eq!(store.edges().len(), 1);
        assert_eq!(store.edges()[0].source, b);
        assert!(!store.node(&a).unwrap().data.outputs["text"].connected);

        // Same port name, retyped to something text cannot feed
        let patch = serde_json::json!({"inputs": {"text": {"type": "number"}}});
        store
            .update_node(&c, patch.as_object().cloned().unwrap())
            .unwrap();
        assert!(store.edges().is_empty());
        assert!(!store.node(&b).unwrap().data.outputs["result"].connected);
        assert!(validation::validate_workflow(store.graph(), None, store.matrix()).is_empty());
    }

    #[test]
    fn test_load_drops_invalid_edges() {
        let mut workflow = Workflow::new("Broken");
        workflow.graph = crate::builder::WorkflowBuilder::new()
            .add_node("a", "text-input", (0.0, 0.0))
            .output("text", PortType::Text)
            .add_node("b", "text-output", (100.0, 0.0))
            .input("text", PortType::Any)
            .add_edge("ghost", "text", "b", "text")
            .add_edge("ghost2", "text", "b", "text")
            .add_edge("a", "text", "b", "text")
            .build();

        let mut store = store();
        store.load(&workflow);
        assert_eq!(store.edges().len(), 1);
        assert_eq!(store.edges()[0].source, "a");
        assert!(store.node("b").unwrap().data.inputs["text"].connected);
        assert!(validation::validate_workflow(store.graph(), None, store.matrix()).is_empty());
    }

    #[test]
    fn test_to_workflow_keeps_loaded_metadata() {
        let created = chrono::DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let mut workflow = Workflow::new("Stored");
        workflow.description = Some("kept across saves".to_string());
        workflow.created_at = created;
        workflow.updated_at = created;

        let mut store = store();
        store.load(&workflow);
        add(&mut store, "text-input");

        let saved = store.to_workflow(workflow.id.as_str(), "Renamed");
        assert_eq!(saved.created_at, created);
        assert_eq!(saved.description.as_deref(), Some("kept across saves"));
        assert_eq!(saved.name, "Renamed");
        assert_eq!(saved.graph.nodes.len(), 1);

        let copy = store.to_workflow("workflow-copy", "Copy");
        assert!(copy.created_at > created);
        assert_eq!(copy.description, None);
    }

    #[test]
    fn test_select_node() {
        let mut store = store();
        let a = add(&mut store, "text-input");
        assert!(store.select_node(Some(&a)));
        assert_eq!(store.selected(), Some(a.as_str()));
        assert!(!store.select_node(Some("ghost")));
        assert_eq!(store.selected(), Some(a.as_str()));
        assert!(store.select_node(None));
        assert_eq!(store.selected(), None);
    }
}
