//! Execution coordinator
//!
//! Runs a workflow graph in dependency order: a node is scheduled only once
//! every upstream node has completed, and independent branches run
//! concurrently on a `JoinSet`.
//!
//! Run status moves `idle -> running -> (completed | error)` and returns to
//! `idle` only through [`ExecutionCoordinator::reset`]. Each run owns a
//! generation number; a reset bumps it, cancels the in-flight tasks and
//! makes every later commit from the discarded run a no-op. Dropping the
//! `run` future before it finishes ends the run in `error`.
//!
//! The coordinator never touches the caller's graph. `run` clones it at
//! start, so edits made while a run is in flight apply to the next run.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::{ErrorPolicy, ExecutionOptions};
use crate::error::{NodeEngineError, Result};
use crate::events::{EventSink, NullEventSink, WorkflowEvent};
use crate::registry::{NodeExecutor, NodeRegistry, PortValues};
use crate::types::{Node, NodeId, NodeStatus, WorkflowGraph};

/// Result and bookkeeping of one node within a run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExecutionState {
    pub status: NodeStatus,
    /// Outputs keyed by output port name
    #[serde(default)]
    pub outputs: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Executor invocations, retries included
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Status of the whole workflow plus every node's state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    /// Unique id of the current (or last) run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    pub status: NodeStatus,
    #[serde(default)]
    pub nodes: BTreeMap<NodeId, NodeExecutionState>,
    /// Run-level failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionState {
    fn running(execution_id: String, graph: &WorkflowGraph) -> Self {
        Self {
            execution_id: Some(execution_id),
            status: NodeStatus::Running,
            nodes: graph
                .nodes
                .iter()
                .map(|n| (n.id.clone(), NodeExecutionState::default()))
                .collect(),
            error: None,
            started_at: Some(Utc::now()),
            finished_at: None,
        }
    }

    /// State of one node in this run
    pub fn node(&self, node_id: &str) -> Option<&NodeExecutionState> {
        self.nodes.get(node_id)
    }

    /// Status of one node (idle if the node is not part of the run)
    pub fn node_status(&self, node_id: &str) -> NodeStatus {
        self.nodes
            .get(node_id)
            .map(|n| n.status)
            .unwrap_or_default()
    }

    pub fn is_running(&self) -> bool {
        self.status == NodeStatus::Running
    }
}

/// The state slot shared by every clone of a coordinator
struct RunSlot {
    generation: u64,
    cancel: CancellationToken,
    state: ExecutionState,
}

/// Schedules node executors over a graph snapshot
///
/// Cloning is cheap and clones share the same run state, so a UI can hold
/// one clone to call [`reset`](Self::reset) while another awaits
/// [`run`](Self::run).
#[derive(Clone)]
pub struct ExecutionCoordinator {
    registry: Arc<NodeRegistry>,
    options: ExecutionOptions,
    events: Arc<dyn EventSink>,
    slot: Arc<Mutex<RunSlot>>,
}

/// What a node task hands back to the scheduler
struct NodeOutcome {
    node_id: NodeId,
    attempts: u32,
    result: Result<PortValues>,
}

impl ExecutionCoordinator {
    /// Create a coordinator with default options and no event sink
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            options: ExecutionOptions::default(),
            events: Arc::new(NullEventSink),
            slot: Arc::new(Mutex::new(RunSlot {
                generation: 0,
                cancel: CancellationToken::new(),
                state: ExecutionState::default(),
            })),
        }
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Copy of the current execution state
    pub fn state(&self) -> ExecutionState {
        self.slot.lock().state.clone()
    }

    /// Current workflow status
    pub fn status(&self) -> NodeStatus {
        self.slot.lock().state.status
    }

    /// Return to idle, discarding per-node results.
    ///
    /// An in-flight run is cancelled; its tasks are aborted and nothing they
    /// produce is written into the fresh state.
    pub fn reset(&self) {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        slot.cancel.cancel();
        slot.cancel = CancellationToken::new();
        if slot.state.is_running() {
            log::info!(
                "Cancelling run {}",
                slot.state.execution_id.as_deref().unwrap_or("-")
            );
        }
        slot.state = ExecutionState::default();
    }

    /// Execute the graph and return the final state.
    ///
    /// Precondition and node failures end in `Ok` with an `error` status.
    /// `Err` is reserved for runs that never owned the state
    /// (`AlreadyRunning`) or were discarded by a reset (`Cancelled`).
    pub async fn run(&self, graph: &WorkflowGraph) -> Result<ExecutionState> {
        let graph = graph.clone();
        let execution_id = uuid::Uuid::new_v4().to_string();

        let (generation, cancel) = {
            let mut slot = self.slot.lock();
            if slot.state.is_running() {
                return Err(NodeEngineError::AlreadyRunning);
            }
            slot.generation += 1;
            slot.cancel = CancellationToken::new();
            slot.state = ExecutionState::running(execution_id.clone(), &graph);
            (slot.generation, slot.cancel.clone())
        };

        log::info!(
            "Starting run {} over {} nodes",
            execution_id,
            graph.nodes.len()
        );
        self.emit(WorkflowEvent::WorkflowStarted {
            execution_id: execution_id.clone(),
            node_count: graph.nodes.len(),
        });

        let run = Run {
            coordinator: self,
            graph: &graph,
            execution_id: &execution_id,
            generation,
            cancel,
        };
        run.execute().await
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Err(e) = self.events.send(event) {
            log::debug!("Dropped workflow event: {}", e);
        }
    }

    /// Apply `update` to the state if `generation` is still current
    fn commit(&self, generation: u64, update: impl FnOnce(&mut ExecutionState)) -> bool {
        let mut slot = self.slot.lock();
        if slot.generation != generation {
            return false;
        }
        update(&mut slot.state);
        true
    }
}

/// One in-flight run
struct Run<'a> {
    coordinator: &'a ExecutionCoordinator,
    graph: &'a WorkflowGraph,
    execution_id: &'a str,
    generation: u64,
    cancel: CancellationToken,
}

impl Run<'_> {
    async fn execute(self) -> Result<ExecutionState> {
        let graph = self.graph;
        if graph.nodes.is_empty() {
            return self.finish(None);
        }

        let node_ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        let mut waiting_on: HashMap<&str, usize> = graph
            .nodes
            .iter()
            .map(|n| {
                let deps = graph
                    .get_dependencies(&n.id)
                    .iter()
                    .filter(|d| node_ids.contains(d.as_str()))
                    .count();
                (n.id.as_str(), deps)
            })
            .collect();

        let mut ready: VecDeque<&Node> = graph
            .nodes
            .iter()
            .filter(|n| waiting_on.get(n.id.as_str()) == Some(&0))
            .collect();

        if ready.is_empty() {
            log::warn!("Run {} has no entry node", self.execution_id);
            return self.finish(Some(
                "no entry point: every node has an incoming edge".to_string(),
            ));
        }

        let mut outputs: HashMap<NodeId, PortValues> = HashMap::new();
        let mut blocked: HashSet<NodeId> = HashSet::new();
        let mut first_failure: Option<String> = None;
        let mut tasks: JoinSet<NodeOutcome> = JoinSet::new();
        let limit = self.coordinator.options.max_concurrency;

        loop {
            while limit == 0 || tasks.len() < limit {
                let Some(node) = ready.pop_front() else { break };
                self.spawn(&mut tasks, node, &outputs)?;
            }
            if tasks.is_empty() {
                break;
            }

            let joined = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(self.cancelled());
                }
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else { break };

            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tasks.abort_all();
                    if e.is_cancelled() {
                        return Err(self.cancelled());
                    }
                    log::warn!("Node task panicked in run {}: {}", self.execution_id, e);
                    first_failure = Some(format!("node task panicked: {}", e));
                    break;
                }
            };

            match outcome.result {
                Ok(node_outputs) => {
                    let map: serde_json::Map<String, serde_json::Value> = node_outputs
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    self.commit_node(&outcome.node_id, |state| {
                        state.status = NodeStatus::Completed;
                        state.outputs = map.clone();
                        state.attempts = outcome.attempts;
                        state.finished_at = Some(Utc::now());
                    })?;
                    self.coordinator.emit(WorkflowEvent::NodeCompleted {
                        node_id: outcome.node_id.clone(),
                        execution_id: self.execution_id.to_string(),
                        outputs: map,
                    });

                    for dependent in graph.get_dependents(&outcome.node_id) {
                        let Some(remaining) = waiting_on.get_mut(dependent.as_str()) else {
                            continue;
                        };
                        *remaining = remaining.saturating_sub(1);
                        if *remaining == 0 && !blocked.contains(&dependent) {
                            if let Some(node) = graph.find_node(&dependent) {
                                ready.push_back(node);
                            }
                        }
                    }
                    outputs.insert(outcome.node_id, node_outputs);
                }
                Err(e) => {
                    let message = e.to_string();
                    log::warn!(
                        "Node '{}' failed after {} attempt(s): {}",
                        outcome.node_id,
                        outcome.attempts,
                        message
                    );
                    self.commit_node(&outcome.node_id, |state| {
                        state.status = NodeStatus::Error;
                        state.error = Some(message.clone());
                        state.attempts = outcome.attempts;
                        state.finished_at = Some(Utc::now());
                    })?;
                    self.coordinator.emit(WorkflowEvent::NodeFailed {
                        node_id: outcome.node_id.clone(),
                        execution_id: self.execution_id.to_string(),
                        error: message.clone(),
                    });
                    if first_failure.is_none() {
                        first_failure =
                            Some(format!("node '{}' failed: {}", outcome.node_id, message));
                    }

                    if self.coordinator.options.error_policy == ErrorPolicy::StopOnError {
                        tasks.abort_all();
                        break;
                    }
                    blocked.extend(self.downstream_of(&outcome.node_id));
                }
            }
        }

        if first_failure.is_none() {
            let stuck: Vec<&str> = graph
                .nodes
                .iter()
                .filter(|n| !outputs.contains_key(&n.id))
                .map(|n| n.id.as_str())
                .collect();
            if !stuck.is_empty() {
                first_failure = Some(format!(
                    "cycle detected involving nodes: {}",
                    stuck.join(", ")
                ));
            }
        }

        self.finish(first_failure)
    }

    /// Mark a node running and hand it to the task set
    fn spawn(
        &self,
        tasks: &mut JoinSet<NodeOutcome>,
        node: &Node,
        outputs: &HashMap<NodeId, PortValues>,
    ) -> Result<()> {
        let inputs = collect_inputs(self.graph, node, outputs);
        self.commit_node(&node.id, |state| {
            state.status = NodeStatus::Running;
            state.started_at = Some(Utc::now());
        })?;
        self.coordinator.emit(WorkflowEvent::NodeStarted {
            node_id: node.id.clone(),
            execution_id: self.execution_id.to_string(),
            attempt: 1,
        });

        let executor = self.coordinator.registry.executor(&node.node_type);
        let events = self.coordinator.events.clone();
        let retries = self.coordinator.options.retry_count;
        let execution_id = self.execution_id.to_string();
        let node = node.clone();

        tasks.spawn(async move {
            let Some(executor) = executor else {
                return NodeOutcome {
                    result: Err(NodeEngineError::failed(format!(
                        "no executor registered for node type '{}'",
                        node.node_type
                    ))),
                    node_id: node.id,
                    attempts: 0,
                };
            };
            execute_with_retry(executor, node, inputs, retries, events, execution_id).await
        });
        Ok(())
    }

    fn commit_node(
        &self,
        node_id: &str,
        update: impl FnOnce(&mut NodeExecutionState),
    ) -> Result<()> {
        let committed = self.coordinator.commit(self.generation, |state| {
            if let Some(node_state) = state.nodes.get_mut(node_id) {
                update(node_state);
            }
        });
        if committed {
            Ok(())
        } else {
            Err(self.cancelled())
        }
    }

    /// Every node reachable from `node_id`, excluding itself
    fn downstream_of(&self, node_id: &str) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<NodeId> = self.graph.get_dependents(node_id).into();
        while let Some(next) = queue.pop_front() {
            if next == node_id || !seen.insert(next.clone()) {
                continue;
            }
            queue.extend(self.graph.get_dependents(&next));
        }
        seen
    }

    fn finish(self, failure: Option<String>) -> Result<ExecutionState> {
        let committed = self.coordinator.commit(self.generation, |state| {
            state.finished_at = Some(Utc::now());
            // Tasks aborted by StopOnError never finished
            for node in state.nodes.values_mut() {
                if node.status == NodeStatus::Running {
                    node.status = NodeStatus::Idle;
                }
            }
            match &failure {
                Some(message) => {
                    state.status = NodeStatus::Error;
                    state.error = Some(message.clone());
                }
                None => state.status = NodeStatus::Completed,
            }
        });
        if !committed {
            return Err(self.cancelled());
        }

        match failure {
            Some(error) => {
                log::warn!("Run {} failed: {}", self.execution_id, error);
                self.coordinator.emit(WorkflowEvent::WorkflowFailed {
                    execution_id: self.execution_id.to_string(),
                    error,
                });
            }
            None => {
                log::info!("Run {} completed", self.execution_id);
                self.coordinator.emit(WorkflowEvent::WorkflowCompleted {
                    execution_id: self.execution_id.to_string(),
                });
            }
        }
        Ok(self.coordinator.state())
    }

    fn cancelled(&self) -> NodeEngineError {
        log::info!("Run {} cancelled", self.execution_id);
        self.coordinator.emit(WorkflowEvent::WorkflowCancelled {
            execution_id: self.execution_id.to_string(),
        });
        NodeEngineError::Cancelled
    }
}

/// A run dropped before `finish` (caller timeout, aborted task) ends in
/// `error` so the slot is not left `running`
impl Drop for Run<'_> {
    fn drop(&mut self) {
        let message = "run abandoned before completion";
        {
            let mut slot = self.coordinator.slot.lock();
            if slot.generation != self.generation || !slot.state.is_running() {
                return;
            }
            slot.cancel.cancel();
            let state = &mut slot.state;
            state.status = NodeStatus::Error;
            state.error = Some(message.to_string());
            state.finished_at = Some(Utc::now());
            for node in state.nodes.values_mut() {
                if node.status == NodeStatus::Running {
                    node.status = NodeStatus::Idle;
                }
            }
        }

        log::warn!("Run {} abandoned", self.execution_id);
        self.coordinator.emit(WorkflowEvent::WorkflowFailed {
            execution_id: self.execution_id.to_string(),
            error: message.to_string(),
        });
    }
}

/// Build a node's inputs: upstream outputs for connected ports (delivered
/// under the target port name), the port's own value otherwise
fn collect_inputs(
    graph: &WorkflowGraph,
    node: &Node,
    outputs: &HashMap<NodeId, PortValues>,
) -> PortValues {
    let mut inputs: PortValues = node
        .data
        .inputs
        .iter()
        .map(|(name, port)| (name.clone(), port.value.clone()))
        .collect();
    for edge in graph.incoming_edges(&node.id) {
        let value = outputs
            .get(&edge.source)
            .and_then(|o| o.get(&edge.source_handle))
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        inputs.insert(edge.target_handle.clone(), value);
    }
    inputs
}

async fn execute_with_retry(
    executor: Arc<dyn NodeExecutor>,
    node: Node,
    inputs: PortValues,
    retries: u32,
    events: Arc<dyn EventSink>,
    execution_id: String,
) -> NodeOutcome {
    let mut attempt = 1;
    loop {
        let result = executor.execute(&node, inputs.clone()).await;
        match result {
            Err(e) if attempt <= retries => {
                attempt += 1;
                log::debug!("Retrying node '{}' (attempt {}): {}", node.id, attempt, e);
                let event = WorkflowEvent::NodeRetrying {
                    node_id: node.id.clone(),
                    execution_id: execution_id.clone(),
                    attempt,
                    error: e.to_string(),
                };
                if let Err(e) = events.send(event) {
                    log::debug!("Dropped workflow event: {}", e);
                }
            }
            result => {
                return NodeOutcome {
                    node_id: node.id,
                    attempts: attempt,
                    result,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Notify;

    use crate::builder::WorkflowBuilder;
    use crate::descriptor::{NodeCategory, NodeTypeDefinition};
    use crate::events::VecEventSink;
    use crate::types::PortType;

    fn definition(node_type: &str) -> NodeTypeDefinition {
        NodeTypeDefinition::new(node_type, NodeCategory::Custom, node_type, "")
    }

    /// Copies `in` to `out`, prefixed with the node id
    fn relay_registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry.register_callback(definition("relay"), |node_id, inputs| async move {
            let upstream = inputs.get("in").and_then(|v| v.as_str()).unwrap_or("");
            let mut out = PortValues::new();
            out.insert("out".to_string(), serde_json::json!(format!("{}{}", upstream, node_id)));
            Ok(out)
        });
        registry.register_callback(definition("fail"), |node_id, _inputs| async move {
            Err(NodeEngineError::failed(format!("{} exploded", node_id)))
        });
        registry
    }

    fn relay(builder: WorkflowBuilder, id: &str) -> WorkflowBuilder {
        builder
            .add_node(id, "relay", (0.0, 0.0))
            .input("in", PortType::Text)
            .output("out", PortType::Text)
    }

    fn coordinator(registry: NodeRegistry) -> (ExecutionCoordinator, Arc<VecEventSink>) {
        let sink = Arc::new(VecEventSink::new());
        let coordinator =
            ExecutionCoordinator::new(Arc::new(registry)).with_event_sink(sink.clone());
        (coordinator, sink)
    }

    fn position(events: &[WorkflowEvent], want: impl Fn(&WorkflowEvent) -> bool) -> usize {
        events.iter().position(want).unwrap()
    }

    #[tokio::test]
    async fn test_chain_runs_in_dependency_order() {
        let graph = relay(relay(relay(WorkflowBuilder::new(), "a"), "b"), "c")
            .add_edge("a", "out", "b", "in")
            .add_edge("b", "out", "c", "in")
            .build();
        let (coordinator, sink) = coordinator(relay_registry());

        let state = coordinator.run(&graph).await.unwrap();
        assert_eq!(state.status, NodeStatus::Completed);
        assert_eq!(state.node("c").unwrap().outputs["out"], "abc");
        assert!(state.execution_id.is_some());
        for id in ["a", "b", "c"] {
            assert_eq!(state.node_status(id), NodeStatus::Completed);
            assert_eq!(state.node(id).unwrap().attempts, 1);
        }

        let events = sink.events();
        let a_done = position(&events, |e| {
            matches!(e, WorkflowEvent::NodeCompleted { node_id, .. } if node_id == "a")
        });
        let b_start = position(&events, |e| {
            matches!(e, WorkflowEvent::NodeStarted { node_id, .. } if node_id == "b")
        });
        let b_done = position(&events, |e| {
            matches!(e, WorkflowEvent::NodeCompleted { node_id, .. } if node_id == "b")
        });
        let c_start = position(&events, |e| {
            matches!(e, WorkflowEvent::NodeStarted { node_id, .. } if node_id == "c")
        });
        assert!(a_done < b_start);
        assert!(b_done < c_start);
        assert!(matches!(events.last(), Some(WorkflowEvent::WorkflowCompleted { .. })));
    }

    #[tokio::test]
    async fn test_unconnected_inputs_use_port_value() {
        let graph = WorkflowBuilder::new()
            .add_node("a", "relay", (0.0, 0.0))
            .input_value("in", PortType::Text, serde_json::json!(">"))
            .output("out", PortType::Text)
            .build();
        let (coordinator, _) = coordinator(relay_registry());

        let state = coordinator.run(&graph).await.unwrap();
        assert_eq!(state.node("a").unwrap().outputs["out"], ">a");
    }

    #[tokio::test]
    async fn test_failure_is_contained_to_downstream() {
        // a -> bad -> c, and an independent sibling s
        let graph = relay(
            relay(
                relay(WorkflowBuilder::new(), "a")
                    .add_node("bad", "fail", (0.0, 0.0))
                    .input("in", PortType::Text)
                    .output("out", PortType::Text),
                "c",
            ),
            "s",
        )
        .add_edge("a", "out", "bad", "in")
        .add_edge("bad", "out", "c", "in")
        .build();
        let (coordinator, sink) = coordinator(relay_registry());

        let state = coordinator.run(&graph).await.unwrap();
        assert_eq!(state.status, NodeStatus::Error);
        assert_eq!(state.node_status("a"), NodeStatus::Completed);
        assert_eq!(state.node_status("s"), NodeStatus::Completed);
        assert_eq!(state.node_status("bad"), NodeStatus::Error);
        assert_eq!(state.node_status("c"), NodeStatus::Idle);
        assert!(state.node("bad").unwrap().error.as_deref().unwrap().contains("exploded"));
        assert!(state.error.as_deref().unwrap().contains("bad"));

        let events = sink.events();
        assert!(!events
            .iter()
            .any(|e| matches!(e, WorkflowEvent::NodeStarted { node_id, .. } if node_id == "c")));
        assert!(matches!(events.last(), Some(WorkflowEvent::WorkflowFailed { .. })));
    }

    #[tokio::test]
    async fn test_no_entry_point_fails_before_scheduling() {
        let graph = relay(relay(WorkflowBuilder::new(), "a"), "b")
            .add_edge("a", "out", "b", "in")
            .add_edge("b", "out", "a", "in")
            .build();
        let (coordinator, sink) = coordinator(relay_registry());

        let state = coordinator.run(&graph).await.unwrap();
        assert_eq!(state.status, NodeStatus::Error);
        assert!(state.error.as_deref().unwrap().contains("no entry point"));
        assert!(!sink
            .events()
            .iter()
            .any(|e| matches!(e, WorkflowEvent::NodeStarted { .. })));
    }

    #[tokio::test]
    async fn test_empty_graph_completes() {
        let (coordinator, _) = coordinator(relay_registry());
        let state = coordinator.run(&WorkflowGraph::new()).await.unwrap();
        assert_eq!(state.status, NodeStatus::Completed);
    }

    #[tokio::test]
    async fn test_cycle_behind_entry_is_reported() {
        // root -> x <-> y
        let graph = relay(
            relay(relay(WorkflowBuilder::new(), "root"), "x").input("loop", PortType::Text),
            "y",
        )
        .add_edge("root", "out", "x", "in")
            .add_edge("x", "out", "y", "in")
            .add_edge("y", "out", "x", "loop")
            .build();
        let (coordinator, _) = coordinator(relay_registry());

        let state = coordinator.run(&graph).await.unwrap();
        assert_eq!(state.status, NodeStatus::Error);
        assert_eq!(state.node_status("root"), NodeStatus::Completed);
        assert!(state.error.as_deref().unwrap().contains("cycle detected"));
    }

    #[tokio::test]
    async fn test_missing_executor_fails_node() {
        let graph = WorkflowBuilder::new()
            .add_node("m", "metadata-only", (0.0, 0.0))
            .build();
        let mut registry = NodeRegistry::new();
        registry.register(definition("metadata-only"));
        let (coordinator, _) = coordinator(registry);

        let state = coordinator.run(&graph).await.unwrap();
        assert_eq!(state.node_status("m"), NodeStatus::Error);
        assert!(state.node("m").unwrap().error.as_deref().unwrap().contains("no executor"));
    }

    #[tokio::test]
    async fn test_retry_then_succeed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = NodeRegistry::new();
        let counter = calls.clone();
        registry.register_callback(definition("flaky"), move |_, _| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(NodeEngineError::Timeout {
                        node_id: "f".to_string(),
                        millis: 10,
                    })
                } else {
                    Ok(PortValues::new())
                }
            }
        });
        let graph = WorkflowBuilder::new().add_node("f", "flaky", (0.0, 0.0)).build();
        let (coordinator, sink) = coordinator(registry);
        let coordinator = coordinator.with_options(ExecutionOptions {
            retry_count: 2,
            ..ExecutionOptions::default()
        });

        let state = coordinator.run(&graph).await.unwrap();
        assert_eq!(state.status, NodeStatus::Completed);
        assert_eq!(state.node("f").unwrap().attempts, 3);
        let retries = sink
            .events()
            .iter()
            .filter(|e| matches!(e, WorkflowEvent::NodeRetrying { .. }))
            .count();
        assert_eq!(retries, 2);
    }

    #[tokio::test]
    async fn test_stop_on_error_cancels_siblings() {
        let gate = Arc::new(Notify::new());
        let mut registry = relay_registry();
        let never = gate.clone();
        registry.register_callback(definition("hang"), move |_, _| {
            let never = never.clone();
            async move {
                never.notified().await;
                Ok(PortValues::new())
            }
        });
        let graph = WorkflowBuilder::new()
            .add_node("h", "hang", (0.0, 0.0))
            .add_node("bad", "fail", (0.0, 0.0))
            .build();
        let (coordinator, _) = coordinator(registry);
        let coordinator = coordinator.with_options(ExecutionOptions {
            error_policy: ErrorPolicy::StopOnError,
            ..ExecutionOptions::default()
        });

        let state = tokio::time::timeout(Duration::from_secs(5), coordinator.run(&graph))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.status, NodeStatus::Error);
        assert_eq!(state.node_status("bad"), NodeStatus::Error);
        assert_eq!(state.node_status("h"), NodeStatus::Idle);
    }

    #[tokio::test]
    async fn test_bounded_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut registry = NodeRegistry::new();
        let (a, p) = (active.clone(), peak.clone());
        registry.register_callback(definition("work"), move |_, _| {
            let (a, p) = (a.clone(), p.clone());
            async move {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                a.fetch_sub(1, Ordering::SeqCst);
                Ok(PortValues::new())
            }
        });
        let mut builder = WorkflowBuilder::new();
        for i in 0..6 {
            builder = builder.add_node(format!("w{}", i), "work", (0.0, 0.0));
        }
        let (coordinator, _) = coordinator(registry);
        let coordinator = coordinator.with_options(ExecutionOptions {
            max_concurrency: 2,
            ..ExecutionOptions::default()
        });

        let state = coordinator.run(&builder.build()).await.unwrap();
        assert_eq!(state.status, NodeStatus::Completed);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_reset_discards_in_flight_result() {
        let started = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = relay_registry();
        let (signal, counter) = (started.clone(), calls.clone());
        registry.register_callback(definition("slow"), move |_, _| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let signal = signal.clone();
            async move {
                let mut out = PortValues::new();
                if n == 0 {
                    signal.notify_one();
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    out.insert("out".to_string(), serde_json::json!("first"));
                } else {
                    out.insert("out".to_string(), serde_json::json!("second"));
                }
                Ok(out)
            }
        });
        let graph = relay(WorkflowBuilder::new(), "a")
            .add_node("b", "slow", (0.0, 0.0))
            .input("in", PortType::Text)
            .output("out", PortType::Text)
            .add_edge("a", "out", "b", "in")
            .build();
        let (coordinator, _) = coordinator(registry);

        let first = {
            let coordinator = coordinator.clone();
            let graph = graph.clone();
            tokio::spawn(async move { coordinator.run(&graph).await })
        };
        started.notified().await;
        assert_eq!(coordinator.state().node_status("b"), NodeStatus::Running);

        coordinator.reset();
        assert_eq!(coordinator.status(), NodeStatus::Idle);
        let first = first.await.unwrap();
        assert!(matches!(first, Err(NodeEngineError::Cancelled)));
        assert!(coordinator.state().nodes.is_empty());

        let second = coordinator.run(&graph).await.unwrap();
        assert_eq!(second.status, NodeStatus::Completed);
        assert_eq!(second.node("b").unwrap().outputs["out"], "second");
        assert_eq!(coordinator.state(), second);
    }

    #[tokio::test]
    async fn test_run_while_running_is_rejected() {
        let started = Arc::new(Notify::new());
        let mut registry = NodeRegistry::new();
        let signal = started.clone();
        registry.register_callback(definition("slow"), move |_, _| {
            let signal = signal.clone();
            async move {
                signal.notify_one();
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(PortValues::new())
            }
        });
        let graph = WorkflowBuilder::new().add_node("s", "slow", (0.0, 0.0)).build();
        let (coordinator, _) = coordinator(registry);

        let first = {
            let coordinator = coordinator.clone();
            let graph = graph.clone();
            tokio::spawn(async move { coordinator.run(&graph).await })
        };
        started.notified().await;

        assert!(matches!(
            coordinator.run(&graph).await,
            Err(NodeEngineError::AlreadyRunning)
        ));
        coordinator.reset();
        assert!(matches!(first.await.unwrap(), Err(NodeEngineError::Cancelled)));
    }

    #[tokio::test]
    async fn test_dropped_run_releases_slot() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = NodeRegistry::new();
        let counter = calls.clone();
        registry.register_callback(definition("slow"), move |_, _| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok(PortValues::new())
            }
        });
        let graph = WorkflowBuilder::new().add_node("s", "slow", (0.0, 0.0)).build();
        let (coordinator, sink) = coordinator(registry);

        let run = tokio::time::timeout(Duration::from_millis(20), coordinator.run(&graph));
        assert!(run.await.is_err());

        let state = coordinator.state();
        assert_eq!(state.status, NodeStatus::Error);
        assert_eq!(state.node_status("s"), NodeStatus::Idle);
        assert!(state.error.as_deref().unwrap().contains("abandoned"));
        assert!(matches!(sink.events().last(), Some(WorkflowEvent::WorkflowFailed { .. })));

        let second = coordinator.run(&graph).await.unwrap();
        assert_eq!(second.status, NodeStatus::Completed);
    }

    #[test]
    fn test_commit_ignores_stale_generation() {
        let coordinator = ExecutionCoordinator::new(Arc::new(NodeRegistry::new()));
        let generation = coordinator.slot.lock().generation;
        coordinator.reset();
        let applied = coordinator.commit(generation, |state| {
            state.error = Some("stale".to_string());
        });
        assert!(!applied);
        assert!(coordinator.state().error.is_none());
    }
}
