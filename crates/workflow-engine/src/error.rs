//! Error types for the workflow engine

use thiserror::Error;

use crate::types::PortType;

/// Result type alias using NodeEngineError
pub type Result<T> = std::result::Result<T, NodeEngineError>;

/// Errors that can occur in the workflow engine
#[derive(Debug, Error)]
pub enum NodeEngineError {
    /// A prospective edge was rejected by the connection validator
    #[error("Invalid connection: {0}")]
    Connection(#[from] ConnectionError),

    /// An edge with this id is already in the graph
    #[error("Edge already exists: {0}")]
    DuplicateEdge(String),

    /// A workflow id does not exist in the repository
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// Node type is not registered and the strict policy is active
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// A run was requested while another run is in progress
    #[error("Workflow is already running")]
    AlreadyRunning,

    /// Task execution failed
    #[error("Task execution failed: {0}")]
    ExecutionFailed(String),

    /// A node executor gave up waiting on its external operation
    #[error("Node '{node_id}' timed out after {millis}ms")]
    Timeout { node_id: String, millis: u64 },

    /// Workflow run was cancelled by a reset
    #[error("Workflow cancelled")]
    Cancelled,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file holds an unusable value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl NodeEngineError {
    /// Create an execution failed error with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }
}

/// Why a prospective edge is not allowed.
///
/// The `Display` text is the human-readable reason handed back to the
/// presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Source or target node does not exist
    #[error("node '{0}' does not exist")]
    NodeNotFound(String),

    /// The named port does not exist on the node
    #[error("node '{node_id}' has no {direction} port '{port}'")]
    PortNotFound {
        node_id: String,
        direction: &'static str,
        port: String,
    },

    /// Hidden ports never take part in connections
    #[error("port '{port}' on node '{node_id}' is hidden")]
    HiddenPort { node_id: String, port: String },

    /// Inputs accept a single incoming edge
    #[error("input '{port}' on node '{node_id}' is already connected")]
    AlreadyConnected { node_id: String, port: String },

    /// The compatibility matrix rejects the source -> target pair
    #[error("incompatible types: '{source_type}' output cannot feed '{target_type}' input")]
    IncompatibleTypes {
        source_type: PortType,
        target_type: PortType,
    },

    /// A handle string was not of the form `input-<name>` / `output-<name>`
    #[error("invalid handle '{0}'")]
    InvalidHandle(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_reasons_name_the_offenders() {
        let err = ConnectionError::IncompatibleTypes {
            source_type: PortType::Image,
            target_type: PortType::Number,
        };
        assert_eq!(
            err.to_string(),
            "incompatible types: 'image' output cannot feed 'number' input"
        );

        let err = ConnectionError::AlreadyConnected {
            node_id: "b".to_string(),
            port: "prompt".to_string(),
        };
        assert_eq!(err.to_string(), "input 'prompt' on node 'b' is already connected");
    }

    #[test]
    fn test_connection_error_converts() {
        let err: NodeEngineError = ConnectionError::NodeNotFound("x".to_string()).into();
        assert!(matches!(err, NodeEngineError::Connection(_)));
        assert_eq!(err.to_string(), "Invalid connection: node 'x' does not exist");
    }
}
