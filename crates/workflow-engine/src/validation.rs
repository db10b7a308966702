//! Connection and graph validation
//!
//! Three checks live here:
//!
//! - [`validate_connection`]: may this one prospective edge be added? Pure,
//!   never touches the graph. [`retain_valid_edges`] replays it over an
//!   existing edge set after a load or a node edit.
//! - [`mark_compatibility`]: tag every node with whether it could accept the
//!   port currently being dragged. Re-derived from scratch on each call.
//! - [`validate_workflow`]: whole-graph structural checks, returning every
//!   problem found (not just the first).

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compatibility::{CompatibilityIndex, CompatibilityMatrix};
use crate::error::ConnectionError;
use crate::registry::NodeRegistry;
use crate::types::{
    ConnectStatus, Edge, NodeId, Port, PortDirection, PortName, WorkflowGraph,
};

/// A port on a specific node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRef {
    pub node_id: NodeId,
    pub port: PortName,
}

impl PortRef {
    pub fn new(node_id: impl Into<NodeId>, port: impl Into<PortName>) -> Self {
        Self {
            node_id: node_id.into(),
            port: port.into(),
        }
    }
}

/// Check whether an edge from `source` (an output) to `target` (an input)
/// may be added to `graph`.
///
/// Checks run in order: both ports resolve (and are visible), the target
/// input is not already fed, the types are compatible.
pub fn validate_connection(
    graph: &WorkflowGraph,
    matrix: &CompatibilityMatrix,
    source: &PortRef,
    target: &PortRef,
) -> Result<(), ConnectionError> {
    validate_connection_ignoring(graph, matrix, source, target, None)
}

/// Same as [`validate_connection`], but the edge `ignore` does not count
/// toward the single-connection check. Used when an existing edge is
/// re-pointed.
pub fn validate_connection_ignoring(
    graph: &WorkflowGraph,
    matrix: &CompatibilityMatrix,
    source: &PortRef,
    target: &PortRef,
    ignore: Option<&str>,
) -> Result<(), ConnectionError> {
    let source_port = resolve_port(graph, source, PortDirection::Output)?;
    let target_port = resolve_port(graph, target, PortDirection::Input)?;

    let already_fed = graph
        .incoming_edges(&target.node_id)
        .any(|e| e.target_handle == target.port && Some(e.id.as_str()) != ignore);
    if already_fed {
        return Err(ConnectionError::AlreadyConnected {
            node_id: target.node_id.clone(),
            port: target.port.clone(),
        });
    }

    if !matrix.compatible(&source_port.port_type, &target_port.port_type) {
        return Err(ConnectionError::IncompatibleTypes {
            source_type: source_port.port_type.clone(),
            target_type: target_port.port_type.clone(),
        });
    }

    Ok(())
}

/// Keep only the edges [`validate_connection`] accepts when they are
/// re-added one by one, in order, onto the graph's nodes.
///
/// Returns each dropped edge with the reason it was rejected.
pub fn retain_valid_edges(
    graph: &mut WorkflowGraph,
    matrix: &CompatibilityMatrix,
) -> Vec<(Edge, ConnectionError)> {
    let candidates = std::mem::take(&mut graph.edges);
    let mut dropped = Vec::new();
    for edge in candidates {
        let checked = validate_connection(
            graph,
            matrix,
            &PortRef::new(edge.source.as_str(), edge.source_handle.as_str()),
            &PortRef::new(edge.target.as_str(), edge.target_handle.as_str()),
        );
        match checked {
            Ok(()) => graph.edges.push(edge),
            Err(reason) => dropped.push((edge, reason)),
        }
    }
    dropped
}

fn resolve_port<'a>(
    graph: &'a WorkflowGraph,
    port_ref: &PortRef,
    direction: PortDirection,
) -> Result<&'a Port, ConnectionError> {
    let node = graph
        .find_node(&port_ref.node_id)
        .ok_or_else(|| ConnectionError::NodeNotFound(port_ref.node_id.clone()))?;
    let port = match direction {
        PortDirection::Input => node.input(&port_ref.port),
        PortDirection::Output => node.output(&port_ref.port),
    }
    .ok_or_else(|| ConnectionError::PortNotFound {
        node_id: port_ref.node_id.clone(),
        direction: direction.as_str(),
        port: port_ref.port.clone(),
    })?;
    if port.hidden {
        return Err(ConnectionError::HiddenPort {
            node_id: port_ref.node_id.clone(),
            port: port_ref.port.clone(),
        });
    }
    Ok(port)
}

/// Tag nodes for a drag-to-connect gesture starting at output `active`.
///
/// Every node other than the one owning `active` is marked compatible if
/// any of its visible inputs accepts the active output's type. With no
/// active port (or one that does not resolve) all marks are cleared.
pub fn mark_compatibility(
    graph: &mut WorkflowGraph,
    index: &CompatibilityIndex<'_>,
    active: Option<&PortRef>,
) {
    let source_type = active.and_then(|port_ref| {
        graph
            .find_node(&port_ref.node_id)
            .and_then(|n| n.output(&port_ref.port))
            .filter(|p| !p.hidden)
            .map(|p| p.port_type.clone())
    });

    let (Some(active), Some(source_type)) = (active, source_type) else {
        clear_compatibility(graph);
        return;
    };

    for node in &mut graph.nodes {
        if node.id == active.node_id {
            node.data.connect_status = None;
            continue;
        }
        let accepts = node
            .visible_inputs()
            .any(|(_, port)| index.compatible(&source_type, &port.port_type));
        node.data.connect_status = Some(if accepts {
            ConnectStatus::Compatible
        } else {
            ConnectStatus::Incompatible
        });
    }
}

/// Remove every drag-time compatibility mark
pub fn clear_compatibility(graph: &mut WorkflowGraph) {
    for node in &mut graph.nodes {
        node.data.connect_status = None;
    }
}

/// A structural problem found by [`validate_workflow`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphIssue {
    /// Cycle detected in the graph
    #[error("Cycle detected involving nodes: {}", .0.join(", "))]
    CycleDetected(Vec<NodeId>),

    /// Two nodes share an id
    #[error("Duplicate node id '{0}'")]
    DuplicateNodeId(NodeId),

    /// Two edges share an id
    #[error("Duplicate edge id '{0}'")]
    DuplicateEdgeId(String),

    /// A node has a type the registry does not know
    #[error("Unknown node type '{node_type}' for node '{node_id}'")]
    UnknownNodeType { node_id: NodeId, node_type: String },

    /// An edge references a non-existent node
    #[error("Edge '{edge_id}' references unknown node '{node_id}'")]
    UnknownNode { edge_id: String, node_id: NodeId },

    /// An edge references a port the node does not have
    #[error("Edge '{edge_id}' references missing {direction} port '{port}' on node '{node_id}'")]
    UnknownPort {
        edge_id: String,
        node_id: NodeId,
        direction: &'static str,
        port: PortName,
    },

    /// An edge attaches to a hidden port
    #[error("Edge '{edge_id}' attaches to hidden port '{port}' on node '{node_id}'")]
    HiddenPort {
        edge_id: String,
        node_id: NodeId,
        port: PortName,
    },

    /// An edge connects incompatible port types
    #[error("Edge '{edge_id}' connects incompatible types: {source_type} -> {target_type}")]
    IncompatiblePortTypes {
        edge_id: String,
        source_type: String,
        target_type: String,
    },

    /// An input port is fed by more than one edge
    #[error("Input '{port}' on node '{node_id}' has {count} incoming edges")]
    MultipleIncomingEdges {
        node_id: NodeId,
        port: PortName,
        count: usize,
    },
}

/// Validate a workflow graph
///
/// Returns all problems found (not just the first). Pass a registry to
/// enable node type checks.
pub fn validate_workflow(
    graph: &WorkflowGraph,
    registry: Option<&NodeRegistry>,
    matrix: &CompatibilityMatrix,
) -> Vec<GraphIssue> {
    let mut issues = Vec::new();

    check_duplicate_ids(graph, &mut issues);
    check_edges(graph, matrix, &mut issues);
    check_single_connection(graph, &mut issues);
    if let Some(registry) = registry {
        check_node_types(graph, registry, &mut issues);
    }

    let cyclic = cycle_members(graph);
    if !cyclic.is_empty() {
        issues.push(GraphIssue::CycleDetected(cyclic));
    }

    issues
}

fn check_duplicate_ids(graph: &WorkflowGraph, issues: &mut Vec<GraphIssue>) {
    let mut seen = HashSet::new();
    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) {
            issues.push(GraphIssue::DuplicateNodeId(node.id.clone()));
        }
    }
    let mut seen = HashSet::new();
    for edge in &graph.edges {
        if !seen.insert(edge.id.as_str()) {
            issues.push(GraphIssue::DuplicateEdgeId(edge.id.clone()));
        }
    }
}

/// Endpoint existence, visibility and type compatibility of every edge
fn check_edges(graph: &WorkflowGraph, matrix: &CompatibilityMatrix, issues: &mut Vec<GraphIssue>) {
    for edge in &graph.edges {
        let mut resolve = |node_id: &str, port: &str, direction: PortDirection| {
            let Some(node) = graph.find_node(node_id) else {
                issues.push(GraphIssue::UnknownNode {
                    edge_id: edge.id.clone(),
                    node_id: node_id.to_string(),
                });
                return None;
            };
            let found = match direction {
                PortDirection::Input => node.input(port),
                PortDirection::Output => node.output(port),
            };
            match found {
                None => {
                    issues.push(GraphIssue::UnknownPort {
                        edge_id: edge.id.clone(),
                        node_id: node_id.to_string(),
                        direction: direction.as_str(),
                        port: port.to_string(),
                    });
                    None
                }
                Some(p) if p.hidden => {
                    issues.push(GraphIssue::HiddenPort {
                        edge_id: edge.id.clone(),
                        node_id: node_id.to_string(),
                        port: port.to_string(),
                    });
                    None
                }
                Some(p) => Some(p.port_type.clone()),
            }
        };

        let source_type = resolve(&edge.source, &edge.source_handle, PortDirection::Output);
        let target_type = resolve(&edge.target, &edge.target_handle, PortDirection::Input);

        if let (Some(source_type), Some(target_type)) = (source_type, target_type) {
            if !matrix.compatible(&source_type, &target_type) {
                issues.push(GraphIssue::IncompatiblePortTypes {
                    edge_id: edge.id.clone(),
                    source_type: source_type.to_string(),
                    target_type: target_type.to_string(),
                });
            }
        }
    }
}

fn check_single_connection(graph: &WorkflowGraph, issues: &mut Vec<GraphIssue>) {
    let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
    let mut order = Vec::new();
    for edge in &graph.edges {
        let key = (edge.target.as_str(), edge.target_handle.as_str());
        let count = counts.entry(key).or_insert(0);
        if *count == 0 {
            order.push(key);
        }
        *count += 1;
    }
    for key in order {
        let count = counts[&key];
        if count > 1 {
            issues.push(GraphIssue::MultipleIncomingEdges {
                node_id: key.0.to_string(),
                port: key.1.to_string(),
                count,
            });
        }
    }
}

fn check_node_types(graph: &WorkflowGraph, registry: &NodeRegistry, issues: &mut Vec<GraphIssue>) {
    for node in &graph.nodes {
        if !registry.has_node_type(&node.node_type) {
            issues.push(GraphIssue::UnknownNodeType {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
            });
        }
    }
}

/// Nodes that Kahn's algorithm can never release, in node order.
///
/// Empty for an acyclic graph. Edges to unknown nodes are ignored.
pub fn cycle_members(graph: &WorkflowGraph) -> Vec<NodeId> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for node in &graph.nodes {
        in_degree.insert(&node.id, 0);
    }
    let edges: Vec<_> = graph
        .edges
        .iter()
        .filter(|e| in_degree.contains_key(e.source.as_str()))
        .filter(|e| in_degree.contains_key(e.target.as_str()))
        .collect();
    for edge in &edges {
        if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
            *deg += 1;
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut released: HashSet<&str> = HashSet::new();
    while let Some(node_id) = queue.pop_front() {
        released.insert(node_id);
        for edge in &edges {
            if edge.source == node_id {
                if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(&edge.target);
                    }
                }
            }
        }
    }

    let mut members: Vec<NodeId> = graph
        .nodes
        .iter()
        .filter(|n| !released.contains(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect();
    members.dedup();
    members
}
