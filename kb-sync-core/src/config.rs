use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Settings shared by the full and incremental sync runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// File suffixes eligible for mirroring, e.g. `.md`.
    pub allowed_extensions: Vec<String>,
    /// Delete knowledge base documents that no repository file produces.
    pub cleanup_deleted: bool,
    /// Read front matter into document metadata.
    pub enable_metadata: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: vec![".md".to_string(), ".mdx".to_string()],
            cleanup_deleted: false,
            enable_metadata: true,
        }
    }
}

impl SyncConfig {
    pub fn trace_loaded(&self) {
        info!(
            extensions = ?self.allowed_extensions,
            cleanup_deleted = self.cleanup_deleted,
            enable_metadata = self.enable_metadata,
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}
