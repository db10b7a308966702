//! Event types for streaming run progress
//!
//! Events are sent from the execution coordinator to the presentation layer
//! (or any consumer) to report node progress, failures and the outcome of a
//! run.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trait for sending workflow events
///
/// This abstracts over the transport mechanism (UI bridge, mpsc, etc.)
/// allowing the coordinator to be used in different contexts.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be sent (e.g., channel closed)
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone, Error)]
#[error("Event error: {message}")]
pub struct EventError {
    pub message: String,
}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkflowEvent {
    /// A run started
    #[serde(rename_all = "camelCase")]
    WorkflowStarted {
        execution_id: String,
        node_count: usize,
    },

    /// Every node completed
    #[serde(rename_all = "camelCase")]
    WorkflowCompleted { execution_id: String },

    /// The run ended in the error state
    #[serde(rename_all = "camelCase")]
    WorkflowFailed { execution_id: String, error: String },

    /// The run was discarded by a reset
    #[serde(rename_all = "camelCase")]
    WorkflowCancelled { execution_id: String },

    /// A node's executor was invoked
    #[serde(rename_all = "camelCase")]
    NodeStarted {
        node_id: String,
        execution_id: String,
        attempt: u32,
    },

    /// A node finished successfully
    #[serde(rename_all = "camelCase")]
    NodeCompleted {
        node_id: String,
        execution_id: String,
        outputs: serde_json::Map<String, serde_json::Value>,
    },

    /// A node failed and will not be retried
    #[serde(rename_all = "camelCase")]
    NodeFailed {
        node_id: String,
        execution_id: String,
        error: String,
    },

    /// A node failed and is about to be retried
    #[serde(rename_all = "camelCase")]
    NodeRetrying {
        node_id: String,
        execution_id: String,
        attempt: u32,
        error: String,
    },
}

impl WorkflowEvent {
    /// The run this event belongs to
    pub fn execution_id(&self) -> &str {
        match self {
            Self::WorkflowStarted { execution_id, .. }
            | Self::WorkflowCompleted { execution_id }
            | Self::WorkflowFailed { execution_id, .. }
            | Self::WorkflowCancelled { execution_id }
            | Self::NodeStarted { execution_id, .. }
            | Self::NodeCompleted { execution_id, .. }
            | Self::NodeFailed { execution_id, .. }
            | Self::NodeRetrying { execution_id, .. } => execution_id,
        }
    }

    /// The node this event is about, if any
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeStarted { node_id, .. }
            | Self::NodeCompleted { node_id, .. }
            | Self::NodeFailed { node_id, .. }
            | Self::NodeRetrying { node_id, .. } => Some(node_id),
            _ => None,
        }
    }
}

/// A no-op event sink that discards all events
///
/// Useful for testing or when events aren't needed.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: WorkflowEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
#[derive(Default)]
pub struct VecEventSink {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();

        sink.send(WorkflowEvent::NodeRetrying {
            node_id: "llm-1".to_string(),
            execution_id: "exec1".to_string(),
            attempt: 2,
            error: "rate limited".to_string(),
        })
        .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].node_id(), Some("llm-1"));
        assert_eq!(events[0].execution_id(), "exec1");

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = WorkflowEvent::WorkflowFailed {
            execution_id: "exec1".to_string(),
            error: "no entry point".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "workflowFailed");
        assert_eq!(json["executionId"], "exec1");
        assert_eq!(event.node_id(), None);
    }

    #[test]
    fn test_null_event_sink() {
        let sink = NullEventSink;
        sink.send(WorkflowEvent::WorkflowCompleted {
            execution_id: "exec1".to_string(),
        })
        .unwrap();
    }
}
