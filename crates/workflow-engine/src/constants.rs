//! Engine-wide constants
//!
//! Single source of truth for configuration defaults and fixed formats.

/// Default values for [`EngineConfig`](crate::config::EngineConfig)
pub mod defaults {
    /// Undo snapshots kept by a graph store
    pub const HISTORY_LIMIT: usize = 100;
    /// Retries after a node's first failed attempt
    pub const RETRY_COUNT: u32 = 0;
    /// Concurrent node tasks per run (0 = unbounded)
    pub const MAX_CONCURRENCY: usize = 0;
    /// Key prefix for stored workflow documents
    pub const WORKFLOW_KEY_PREFIX: &str = "workflow_";
    /// Key of the workflow summary index
    pub const INDEX_KEY: &str = "workflows";
    /// Directory for the file key-value store, relative to the config dir
    pub const STORAGE_DIR: &str = "workflows";
    /// Input ports whose values are blanked on export
    pub const REDACTED_INPUTS: &[&str] = &["apiKey"];
}

/// File names
pub mod files {
    /// Engine configuration file inside the config directory
    pub const CONFIG: &str = "engine.json";
    /// Extension used by the file key-value store
    pub const STORE_EXTENSION: &str = "json";
}

/// Undo snapshot compression
pub mod compression {
    /// zstd level for undo snapshots
    pub const ZSTD_LEVEL: i32 = 3;
}

/// Id prefixes
pub mod ids {
    pub const EDGE_PREFIX: &str = "edge";
    pub const WORKFLOW_PREFIX: &str = "workflow";
}
