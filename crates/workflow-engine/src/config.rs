//! Engine configuration storage
//!
//! Handles persistent storage of editing, execution and storage settings.
//! Every field has a default, so a partial or missing file still loads.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::constants::{defaults, files};
use crate::error::{NodeEngineError, Result};

/// What `add_node` does with a type the registry does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTypePolicy {
    /// Create a node with no ports
    #[default]
    EmptyNode,
    /// Fail with `UnknownNodeType`
    Reject,
}

/// How a node failure affects the rest of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Halt only the failed node's downstream subgraph
    #[default]
    Contain,
    /// Cancel every in-flight node on the first failure
    StopOnError,
}

/// Execution coordinator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    pub error_policy: ErrorPolicy,
    /// Retries after a node's first failed attempt
    pub retry_count: u32,
    /// Concurrent node tasks per run (0 = unbounded)
    pub max_concurrency: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::default(),
            retry_count: defaults::RETRY_COUNT,
            max_concurrency: defaults::MAX_CONCURRENCY,
        }
    }
}

/// Workflow persistence settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the file store; `None` means `<config dir>/workflows`
    pub root: Option<PathBuf>,
    pub workflow_key_prefix: String,
    pub index_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: None,
            workflow_key_prefix: defaults::WORKFLOW_KEY_PREFIX.to_string(),
            index_key: defaults::INDEX_KEY.to_string(),
        }
    }
}

impl StorageConfig {
    /// Resolve the store directory against the config directory
    pub fn root_in(&self, config_dir: &Path) -> PathBuf {
        match &self.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => config_dir.join(root),
            None => config_dir.join(defaults::STORAGE_DIR),
        }
    }
}

/// Workflow export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Input ports whose values are blanked on export
    pub redacted_inputs: Vec<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            redacted_inputs: defaults::REDACTED_INPUTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Undo snapshots kept by the graph store
    pub history_limit: usize,
    pub unknown_node_types: UnknownTypePolicy,
    pub execution: ExecutionOptions,
    pub storage: StorageConfig,
    pub export: ExportConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: defaults::HISTORY_LIMIT,
            unknown_node_types: UnknownTypePolicy::default(),
            execution: ExecutionOptions::default(),
            storage: StorageConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `dir`; a missing file yields the defaults
    pub async fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(files::CONFIG);

        if !fs::try_exists(&config_path).await? {
            log::debug!("No config at {:?}; using defaults", config_path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path).await?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `dir`, creating it if needed
    pub async fn save(&self, dir: &Path) -> Result<()> {
        self.validate()?;
        fs::create_dir_all(dir).await?;

        let config_path = dir.join(files::CONFIG);
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, contents).await?;

        log::info!("Configuration saved to {:?}", config_path);
        Ok(())
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.history_limit == 0 {
            return Err(NodeEngineError::Config(
                "history_limit must be at least 1".to_string(),
            ));
        }
        let storage = &self.storage;
        if storage.index_key.is_empty() {
            return Err(NodeEngineError::Config("index_key is empty".to_string()));
        }
        if storage.index_key.starts_with(&storage.workflow_key_prefix) {
            return Err(NodeEngineError::Config(format!(
                "index_key '{}' collides with workflow_key_prefix '{}'",
                storage.index_key, storage.workflow_key_prefix
            )));
        }
        Ok(())
    }
}
