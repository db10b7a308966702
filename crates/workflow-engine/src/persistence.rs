//! Workflow persistence
//!
//! Workflows are stored as JSON documents in a string key-value store, one
//! key per workflow (`<prefix><id>`) plus an index key holding the summary
//! list shown in a workflow picker.
//!
//! Two stores are provided: [`MemoryStore`] for tests and ephemeral hosts,
//! and [`FileStore`], which keeps one `<key>.json` file per key.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::compatibility::CompatibilityMatrix;
use crate::config::{EngineConfig, ExportConfig, StorageConfig};
use crate::constants::files;
use crate::error::{NodeEngineError, Result};
use crate::types::{Workflow, WorkflowGraph};
use crate::validation;

// =============================================================================
// Key-value stores
// =============================================================================

/// String key-value storage backing the repository
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Remove a key; false if it was not present
    async fn remove(&self, key: &str) -> Result<bool>;

    /// All keys, sorted
    async fn keys(&self) -> Result<Vec<String>>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// One file per key under a root directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// The directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && !key.contains(|c| c == '/' || c == '\\')
            && !key.contains("..");
        if !valid {
            return Err(NodeEngineError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage key '{}'", key),
            )));
        }
        Ok(self
            .root
            .join(format!("{}.{}", key, files::STORE_EXTENSION)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root).await?;

        // Write-then-rename so a crash never leaves a truncated document
        let tmp = path.with_extension(format!("{}.tmp", files::STORE_EXTENSION));
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(files::STORE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Index entry for one stored workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub node_count: usize,
    pub edge_count: usize,
}

impl From<&Workflow> for WorkflowSummary {
    fn from(workflow: &Workflow) -> Self {
        Self {
            id: workflow.id.clone(),
            name: workflow.name.clone(),
            description: workflow.description.clone(),
            created_at: workflow.created_at,
            updated_at: workflow.updated_at,
            node_count: workflow.graph.nodes.len(),
            edge_count: workflow.graph.edges.len(),
        }
    }
}

/// Metadata update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowMeta {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Shape accepted by [`WorkflowRepository::import`]: ids and timestamps are
/// ignored, everything but the graph is optional
#[derive(Debug, Deserialize)]
struct ImportedWorkflow {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(flatten)]
    graph: WorkflowGraph,
}

const IMPORTED_NAME: &str = "Imported workflow";

/// Saves, loads and indexes workflow documents
pub struct WorkflowRepository<S> {
    store: S,
    storage: StorageConfig,
    export: ExportConfig,
    /// Judges imported edges
    matrix: Arc<CompatibilityMatrix>,
    /// Serializes read-modify-write cycles on the index key
    index_lock: tokio::sync::Mutex<()>,
}

impl<S: KeyValueStore> WorkflowRepository<S> {
    pub fn new(store: S) -> Self {
        Self::with_settings(store, StorageConfig::default(), ExportConfig::default())
    }

    pub fn from_config(store: S, config: &EngineConfig) -> Self {
        Self::with_settings(store, config.storage.clone(), config.export.clone())
    }

    pub fn with_settings(store: S, storage: StorageConfig, export: ExportConfig) -> Self {
        Self {
            store,
            storage,
            export,
            matrix: Arc::new(CompatibilityMatrix::standard()),
            index_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Use a custom compatibility matrix for imports
    pub fn with_matrix(mut self, matrix: Arc<CompatibilityMatrix>) -> Self {
        self.matrix = matrix;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.storage.workflow_key_prefix, id)
    }

    /// Create and store an empty workflow
    pub async fn create(&self, name: &str, description: Option<&str>) -> Result<Workflow> {
        let mut workflow = Workflow::new(name);
        workflow.description = description.map(str::to_string);
        self.save(&workflow).await
    }

    /// Store `workflow`, stamping `updatedAt`; returns the stored copy
    pub async fn save(&self, workflow: &Workflow) -> Result<Workflow> {
        let mut stored = workflow.clone();
        stored.updated_at = Utc::now();
        let json = serde_json::to_string(&stored)?;
        self.store.set(&self.key(&stored.id), json).await?;

        let _guard = self.index_lock.lock().await;
        let mut index = self.read_index().await?;
        let summary = WorkflowSummary::from(&stored);
        match index.iter_mut().find(|s| s.id == stored.id) {
            Some(existing) => *existing = summary,
            None => index.push(summary),
        }
        self.write_index(&index).await?;

        log::debug!("Saved workflow '{}'", stored.id);
        Ok(stored)
    }

    pub async fn load(&self, id: &str) -> Result<Workflow> {
        let json = self
            .store
            .get(&self.key(id))
            .await?
            .ok_or_else(|| NodeEngineError::WorkflowNotFound(id.to_string()))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Remove a workflow and its index entry; false if it did not exist
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.store.remove(&self.key(id)).await?;

        let _guard = self.index_lock.lock().await;
        let mut index = self.read_index().await?;
        let before = index.len();
        index.retain(|s| s.id != id);
        if index.len() != before {
            self.write_index(&index).await?;
        }

        if removed {
            log::info!("Deleted workflow '{}'", id);
        }
        Ok(removed)
    }

    /// Stored workflows, most recently updated first.
    ///
    /// A missing index is rebuilt from the stored documents.
    pub async fn list(&self) -> Result<Vec<WorkflowSummary>> {
        let _guard = self.index_lock.lock().await;
        let mut index = match self.store.get(&self.storage.index_key).await? {
            Some(json) => serde_json::from_str(&json)?,
            None => self.rebuild_index().await?,
        };
        index.sort_by(|a: &WorkflowSummary, b| b.updated_at.cmp(&a.updated_at));
        Ok(index)
    }

    pub async fn rename(&self, id: &str, name: &str) -> Result<Workflow> {
        self.update_meta(
            id,
            WorkflowMeta {
                name: Some(name.to_string()),
                description: None,
            },
        )
        .await
    }

    pub async fn update_meta(&self, id: &str, meta: WorkflowMeta) -> Result<Workflow> {
        let mut workflow = self.load(id).await?;
        if let Some(name) = meta.name {
            workflow.name = name;
        }
        if let Some(description) = meta.description {
            workflow.description = Some(description);
        }
        self.save(&workflow).await
    }

    /// Pretty JSON for sharing. Redacted input values are nulled and
    /// transient execution/drag state is dropped.
    pub async fn export(&self, id: &str) -> Result<String> {
        let mut workflow = self.load(id).await?;
        for node in &mut workflow.graph.nodes {
            node.data.status = None;
            node.data.connect_status = None;
            for (name, port) in node.data.inputs.iter_mut() {
                if self.export.redacted_inputs.iter().any(|r| r == name) {
                    port.value = serde_json::Value::Null;
                }
            }
        }
        Ok(serde_json::to_string_pretty(&workflow)?)
    }

    /// Store a workflow from exported JSON under a fresh id and timestamps.
    ///
    /// Edges the connection validator rejects are dropped with a warning.
    pub async fn import(&self, json: &str) -> Result<Workflow> {
        let imported: ImportedWorkflow = serde_json::from_str(json)?;
        let mut workflow = Workflow::new(imported.name.as_deref().unwrap_or(IMPORTED_NAME));
        workflow.description = imported.description;
        workflow.graph = imported.graph;
        for (edge, reason) in validation::retain_valid_edges(&mut workflow.graph, &self.matrix) {
            log::warn!("Dropping imported edge '{}': {}", edge.id, reason);
        }
        workflow.graph.sync_connection_flags();

        log::info!(
            "Imported workflow '{}' ({} nodes)",
            workflow.id,
            workflow.graph.nodes.len()
        );
        self.save(&workflow).await
    }

    async fn read_index(&self) -> Result<Vec<WorkflowSummary>> {
        match self.store.get(&self.storage.index_key).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => self.rebuild_index().await,
        }
    }

    async fn write_index(&self, index: &[WorkflowSummary]) -> Result<()> {
        let json = serde_json::to_string(index)?;
        self.store.set(&self.storage.index_key, json).await
    }

    /// Recreate the summary list by reading every stored document
    async fn rebuild_index(&self) -> Result<Vec<WorkflowSummary>> {
        let prefix = &self.storage.workflow_key_prefix;
        let mut index = Vec::new();
        for key in self.store.keys().await? {
            if !key.starts_with(prefix.as_str()) {
                continue;
            }
            let Some(json) = self.store.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<Workflow>(&json) {
                Ok(workflow) => index.push(WorkflowSummary::from(&workflow)),
                Err(e) => log::warn!("Skipping unreadable workflow '{}': {}", key, e),
            }
        }
        log::debug!("Rebuilt workflow index ({} entries)", index.len());
        Ok(index)
    }
}
