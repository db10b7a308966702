//! Node type registry
//!
//! Maps node type strings to their [`NodeTypeDefinition`] and, optionally,
//! an opaque [`NodeExecutor`]. The registry is an explicit instance passed to
//! whatever needs it (graph store, validator, coordinator), so independent
//! graphs and tests can each use their own.
//!
//! # Usage
//!
//! ```ignore
//! use workflow_engine::{NodeRegistry, NodeTypeDefinition};
//!
//! let mut registry = NodeRegistry::with_builtins();
//! registry.register_callback(my_definition(), |node_id, inputs| async move {
//!     Ok(inputs)
//! });
//! let registry = Arc::new(registry);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::descriptor::{DescriptorFn, NodeCategory, NodeTypeDefinition, PortSchemaSet};
use crate::error::Result;
use crate::types::{Node, Port, PortName};

/// Values keyed by port name, as passed into and out of an executor
pub type PortValues = HashMap<PortName, serde_json::Value>;

/// Per-node-type executor
///
/// The engine treats this as an opaque reference: it hands over the node and
/// its collected inputs and records whatever comes back. Timeouts on the
/// external operation are the executor's concern and should surface as
/// [`NodeEngineError::Timeout`](crate::NodeEngineError::Timeout).
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Execute one node with inputs keyed by its input port names.
    ///
    /// Returns outputs keyed by output port name.
    async fn execute(&self, node: &Node, inputs: PortValues) -> Result<PortValues>;
}

/// Link-time registration of an executor for a node type
pub struct ExecutorFn(pub &'static str, pub fn() -> Arc<dyn NodeExecutor>);

inventory::collect!(ExecutorFn);

/// A definition plus its optional executor
#[derive(Clone)]
struct RegistryEntry {
    definition: NodeTypeDefinition,
    executor: Option<Arc<dyn NodeExecutor>>,
}

/// Registry of node types with their definitions and executors
///
/// # Composability
///
/// Registries can be composed by merging:
/// ```ignore
/// let mut registry = NodeRegistry::with_builtins();
/// registry.merge(plugin_registry); // plugin entries win on conflict
/// ```
#[derive(Clone, Default)]
pub struct NodeRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every definition and executor submitted
    /// through `inventory` by linked node-type crates
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for descriptor in inventory::iter::<DescriptorFn> {
            registry.register((descriptor.0)());
        }
        for executor in inventory::iter::<ExecutorFn> {
            if !registry.attach_executor(executor.0, (executor.1)()) {
                log::warn!(
                    "Executor submitted for unregistered node type '{}'",
                    executor.0
                );
            }
        }
        log::debug!("Collected {} built-in node types", registry.entries.len());
        registry
    }

    /// Register a node type definition with no executor.
    ///
    /// An existing entry for the same type is replaced (with a warning).
    pub fn register(&mut self, definition: NodeTypeDefinition) {
        self.insert(RegistryEntry {
            definition,
            executor: None,
        });
    }

    /// Register a node type together with its executor
    pub fn register_with_executor(
        &mut self,
        definition: NodeTypeDefinition,
        executor: Arc<dyn NodeExecutor>,
    ) {
        self.insert(RegistryEntry {
            definition,
            executor: Some(executor),
        });
    }

    /// Register a node type backed by an async callback.
    ///
    /// The callback receives (node_id, inputs) and returns outputs.
    pub fn register_callback<F, Fut>(&mut self, definition: NodeTypeDefinition, callback: F)
    where
        F: Fn(String, PortValues) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PortValues>> + Send + 'static,
    {
        let executor = CallbackNodeExecutor {
            callback: Box::new(move |node_id, inputs| Box::pin(callback(node_id, inputs))),
        };
        self.register_with_executor(definition, Arc::new(executor));
    }

    /// Attach an executor to an already registered type.
    ///
    /// Returns false if the type is not registered.
    pub fn attach_executor(&mut self, node_type: &str, executor: Arc<dyn NodeExecutor>) -> bool {
        match self.entries.get_mut(node_type) {
            Some(entry) => {
                entry.executor = Some(executor);
                true
            }
            None => false,
        }
    }

    fn insert(&mut self, entry: RegistryEntry) {
        let node_type = entry.definition.node_type.clone();
        if self.entries.insert(node_type.clone(), entry).is_some() {
            log::warn!("Node type '{}' registered twice; replacing definition", node_type);
        }
    }

    /// Definition for a node type
    pub fn lookup(&self, node_type: &str) -> Option<&NodeTypeDefinition> {
        self.entries.get(node_type).map(|e| &e.definition)
    }

    /// Executor for a node type, if one was attached
    pub fn executor(&self, node_type: &str) -> Option<Arc<dyn NodeExecutor>> {
        self.entries
            .get(node_type)
            .and_then(|e| e.executor.clone())
    }

    /// Check if a node type is registered
    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    /// All registered node type strings, sorted
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    /// All registered definitions, sorted by node type
    pub fn all_definitions(&self) -> Vec<&NodeTypeDefinition> {
        let mut defs: Vec<&NodeTypeDefinition> =
            self.entries.values().map(|e| &e.definition).collect();
        defs.sort_by(|a, b| a.node_type.cmp(&b.node_type));
        defs
    }

    /// Definitions in one category, sorted by node type
    pub fn definitions_by_category(&self, category: &NodeCategory) -> Vec<&NodeTypeDefinition> {
        self.all_definitions()
            .into_iter()
            .filter(|d| &d.category == category)
            .collect()
    }

    /// Case-insensitive search over type, label and description
    pub fn search(&self, query: &str) -> Vec<&NodeTypeDefinition> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.all_definitions();
        }
        self.all_definitions()
            .into_iter()
            .filter(|d| {
                d.node_type.to_lowercase().contains(&query)
                    || d.label.to_lowercase().contains(&query)
                    || d.description.to_lowercase().contains(&query)
            })
            .collect()
    }

    /// Default port schema for a type; empty if the type is unregistered
    pub fn default_schema(&self, node_type: &str) -> PortSchemaSet {
        self.lookup(node_type)
            .map(|d| d.ports.clone())
            .unwrap_or_default()
    }

    /// Concrete (inputs, outputs) for a fresh instance of a type
    pub fn instantiate_ports(
        &self,
        node_type: &str,
    ) -> (BTreeMap<PortName, Port>, BTreeMap<PortName, Port>) {
        let schema = self.default_schema(node_type);
        (schema.input_ports(), schema.output_ports())
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge another registry into this one.
    ///
    /// Entries from `other` override entries in `self` if they share the same node_type.
    pub fn merge(&mut self, other: NodeRegistry) {
        for (_, entry) in other.entries {
            self.insert(entry);
        }
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("node_types", &self.node_types())
            .finish()
    }
}

type BoxedCallback = Box<
    dyn Fn(String, PortValues) -> Pin<Box<dyn Future<Output = Result<PortValues>> + Send>>
        + Send
        + Sync,
>;

/// Async callback-based NodeExecutor
///
/// Lets a host bridge node execution to code living outside the engine.
pub struct CallbackNodeExecutor {
    callback: BoxedCallback,
}

#[async_trait]
impl NodeExecutor for CallbackNodeExecutor {
    async fn execute(&self, node: &Node, inputs: PortValues) -> Result<PortValues> {
        (self.callback)(node.id.clone(), inputs).await
    }
}

/// Synchronous callback-based NodeExecutor
pub struct SyncCallbackNodeExecutor {
    callback: Box<dyn Fn(&Node, PortValues) -> Result<PortValues> + Send + Sync>,
}

impl SyncCallbackNodeExecutor {
    pub fn new(
        callback: impl Fn(&Node, PortValues) -> Result<PortValues> + Send + Sync + 'static,
    ) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }
}

#[async_trait]
impl NodeExecutor for SyncCallbackNodeExecutor {
    async fn execute(&self, node: &Node, inputs: PortValues) -> Result<PortValues> {
        (self.callback)(node, inputs)
    }
}
