//! Edit history for the graph store
//!
//! Each committed edit records a zstd-compressed JSON revision of the node
//! and edge sets. Undo and redo move a cursor over those revisions, so no
//! edit needs an inverse operation.
//!
//! Revisions hold document state only. Execution status and drag marks are
//! stripped before encoding, so stepping through history never brings back
//! a stale run display, and an edit that changes nothing but those records
//! no revision. A restored graph has its `connected` flags re-derived and
//! the caller's selection is cleared if the selected node is gone.

use std::collections::VecDeque;

use crate::constants::compression;
use crate::error::{NodeEngineError, Result};
use crate::types::{NodeId, WorkflowGraph};

/// Bounded undo/redo history of a [`WorkflowGraph`]
pub struct GraphHistory {
    /// Compressed revisions, oldest first
    revisions: VecDeque<Vec<u8>>,
    /// Index of the revision matching the live graph
    cursor: usize,
    limit: usize,
}

impl GraphHistory {
    /// Keep at most `limit` revisions (at least one)
    pub fn new(limit: usize) -> Self {
        Self {
            revisions: VecDeque::new(),
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Forget every revision and start over from `graph`
    pub fn reset(&mut self, graph: &WorkflowGraph) -> Result<()> {
        let revision = encode(graph)?;
        self.revisions.clear();
        self.revisions.push_back(revision);
        self.cursor = 0;
        Ok(())
    }

    /// Record `graph` after a committed edit, discarding any redo tail.
    ///
    /// Returns false when the graph matches the current revision.
    pub fn record(&mut self, graph: &WorkflowGraph) -> Result<bool> {
        let revision = encode(graph)?;
        if self.revisions.get(self.cursor) == Some(&revision) {
            return Ok(false);
        }

        self.revisions.truncate(self.cursor + 1);
        self.revisions.push_back(revision);
        if self.revisions.len() > self.limit {
            self.revisions.pop_front();
        }
        self.cursor = self.revisions.len() - 1;
        Ok(true)
    }

    /// The graph one revision back, or `None` at the oldest revision
    pub fn undo(&mut self, selected: &mut Option<NodeId>) -> Result<Option<WorkflowGraph>> {
        if !self.can_undo() {
            return Ok(None);
        }
        self.step_to(self.cursor - 1, selected).map(Some)
    }

    /// The graph one revision forward, or `None` at the newest revision
    pub fn redo(&mut self, selected: &mut Option<NodeId>) -> Result<Option<WorkflowGraph>> {
        if !self.can_redo() {
            return Ok(None);
        }
        self.step_to(self.cursor + 1, selected).map(Some)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.revisions.len()
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// Total size of the compressed revisions in bytes
    pub fn compressed_size(&self) -> usize {
        self.revisions.iter().map(Vec::len).sum()
    }

    /// Decode revision `index` and move the cursor there. The cursor stays
    /// put if the revision cannot be decoded.
    fn step_to(&mut self, index: usize, selected: &mut Option<NodeId>) -> Result<WorkflowGraph> {
        let revision = self
            .revisions
            .get(index)
            .ok_or_else(|| NodeEngineError::Compression(format!("no revision at {}", index)))?;
        let mut graph = decode(revision)?;
        graph.sync_connection_flags();
        if selected
            .as_deref()
            .is_some_and(|id| graph.find_node(id).is_none())
        {
            *selected = None;
        }

        self.cursor = index;
        Ok(graph)
    }
}

fn encode(graph: &WorkflowGraph) -> Result<Vec<u8>> {
    let mut document = graph.clone();
    for node in &mut document.nodes {
        node.data.status = None;
        node.data.connect_status = None;
    }
    let json = serde_json::to_vec(&document)?;
    zstd::encode_all(&json[..], compression::ZSTD_LEVEL)
        .map_err(|e| NodeEngineError::Compression(e.to_string()))
}

fn decode(revision: &[u8]) -> Result<WorkflowGraph> {
    let json =
        zstd::decode_all(revision).map_err(|e| NodeEngineError::Compression(e.to_string()))?;
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::WorkflowBuilder;
    use crate::types::{ConnectStatus, NodeStatus, PortType};

    fn graph_with(ids: &[&str]) -> WorkflowGraph {
        let mut builder = WorkflowBuilder::new();
        for id in ids {
            builder = builder
                .add_node(*id, "relay", (0.0, 0.0))
                .input("in", PortType::Text)
                .output("out", PortType::Text);
        }
        builder.build()
    }

    fn ids(graph: &WorkflowGraph) -> Vec<&str> {
        graph.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn test_undo_and_redo_walk_revisions() {
        let mut history = GraphHistory::new(10);
        let mut selected = None;
        history.reset(&graph_with(&[])).unwrap();
        history.record(&graph_with(&["a"])).unwrap();
        history.record(&graph_with(&["a", "b"])).unwrap();

        assert_eq!(ids(&history.undo(&mut selected).unwrap().unwrap()), ["a"]);
        assert!(history.undo(&mut selected).unwrap().unwrap().nodes.is_empty());
        assert!(history.undo(&mut selected).unwrap().is_none());

        assert_eq!(ids(&history.redo(&mut selected).unwrap().unwrap()), ["a"]);

        // A new edit discards the redo tail
        history.record(&graph_with(&["c"])).unwrap();
        assert!(!history.can_redo());
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = GraphHistory::new(3);
        let mut selected = None;
        for id in ["a", "b", "c", "d", "e"] {
            history.record(&graph_with(&[id])).unwrap();
        }

        assert_eq!(history.len(), 3);
        history.undo(&mut selected).unwrap();
        assert_eq!(ids(&history.undo(&mut selected).unwrap().unwrap()), ["c"]);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_display_state_is_not_an_edit() {
        let mut history = GraphHistory::new(10);
        let graph = graph_with(&["a"]);
        history.reset(&graph).unwrap();

        let mut painted = graph.clone();
        painted.nodes[0].data.status = Some(NodeStatus::Completed);
        painted.nodes[0].data.connect_status = Some(ConnectStatus::Compatible);
        assert!(!history.record(&painted).unwrap());
        assert!(!history.can_undo());

        history.record(&graph_with(&["a", "b"])).unwrap();
        let mut selected = None;
        let restored = history.undo(&mut selected).unwrap().unwrap();
        assert_eq!(restored.nodes[0].data.status, None);
        assert_eq!(restored.nodes[0].data.connect_status, None);
    }

    #[test]
    fn test_restore_resyncs_flags_and_selection() {
        let mut history = GraphHistory::new(10);
        let base = WorkflowBuilder::new()
            .add_node("a", "relay", (0.0, 0.0))
            .output("out", PortType::Text)
            .add_node("b", "relay", (0.0, 0.0))
            .input("in", PortType::Text)
            .build();
        history.reset(&base).unwrap();

        let mut linked = base.clone();
        linked.edges.push(crate::types::Edge::new("a", "out", "b", "in"));
        history.record(&linked).unwrap();

        let mut removed = linked.clone();
        removed.nodes.retain(|n| n.id != "b");
        removed.edges.clear();
        history.record(&removed).unwrap();

        let mut selected = Some("a".to_string());
        let restored = history.undo(&mut selected).unwrap().unwrap();
        assert!(restored.find_node("b").unwrap().data.inputs["in"].connected);
        assert_eq!(selected.as_deref(), Some("a"));

        let mut selected = Some("b".to_string());
        history.redo(&mut selected).unwrap();
        assert_eq!(selected, None);
        assert!(history.compressed_size() > 0);
    }
}
