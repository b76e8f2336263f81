//! `load_config`: reads the YAML config file, injects secrets from the
//! environment and validates the result before any remote call is made.
//!
//! Secrets may live in the file or in the environment; the environment wins:
//! - `GITLAB_PRIVATE_TOKEN` overrides `gitlab.private_token`
//! - `DIFY_API_KEY` overrides `dify.api_key`
//! - `DIFY_KNOWLEDGE_BASE_ID` overrides `dify.knowledge_base_id`
//!
//! All errors are `anyhow::Error` and surface at the CLI boundary.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use kb_sync_core::config::SyncConfig;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use crate::dify::{default_process_rule, DifySettings};
use crate::gitlab::GitLabSettings;
use crate::http::HttpSettings;

pub const GITLAB_TOKEN_ENV: &str = "GITLAB_PRIVATE_TOKEN";
pub const DIFY_API_KEY_ENV: &str = "DIFY_API_KEY";
pub const DIFY_KNOWLEDGE_BASE_ENV: &str = "DIFY_KNOWLEDGE_BASE_ID";

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    pub gitlab: GitLabSection,
    pub dify: DifySection,
    #[serde(default)]
    pub sync: SyncSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabSection {
    pub host: String,
    #[serde(default)]
    pub private_token: String,
    #[serde(default = "default_extensions")]
    pub allowed_file_extensions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DifySection {
    pub host: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub knowledge_base_id: String,
    #[serde(default = "default_indexing_technique")]
    pub indexing_technique: String,
    #[serde(default)]
    pub process_rule: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Seconds per request.
    pub timeout: u64,
    pub max_retries: u32,
    /// Seconds between attempts.
    pub retry_interval: u64,
    pub page_size: u32,
    pub verify_ssl: bool,
    pub cleanup_deleted: bool,
    pub enable_metadata: bool,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            timeout: 60,
            max_retries: 3,
            retry_interval: 2,
            page_size: 100,
            verify_ssl: true,
            cleanup_deleted: false,
            enable_metadata: true,
        }
    }
}

fn default_extensions() -> Vec<String> {
    SyncConfig::default().allowed_extensions
}

fn default_indexing_technique() -> String {
    "high_quality".to_string()
}

impl CliConfig {
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.sync.timeout),
            max_retries: self.sync.max_retries,
            retry_interval: Duration::from_secs(self.sync.retry_interval),
            verify_ssl: self.sync.verify_ssl,
        }
    }

    pub fn gitlab_settings(&self) -> GitLabSettings {
        GitLabSettings {
            host: self.gitlab.host.clone(),
            private_token: self.gitlab.private_token.clone(),
            page_size: self.sync.page_size,
        }
    }

    pub fn dify_settings(&self) -> DifySettings {
        DifySettings {
            host: self.dify.host.clone(),
            api_key: self.dify.api_key.clone(),
            knowledge_base_id: self.dify.knowledge_base_id.clone(),
            indexing_technique: self.dify.indexing_technique.clone(),
            process_rule: self
                .dify
                .process_rule
                .clone()
                .unwrap_or_else(default_process_rule),
            page_size: self.sync.page_size,
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            allowed_extensions: self.gitlab.allowed_file_extensions.clone(),
            cleanup_deleted: self.sync.cleanup_deleted,
            enable_metadata: self.sync.enable_metadata,
        }
    }

    fn apply_env_overrides(&mut self) {
        let overrides = [
            (GITLAB_TOKEN_ENV, &mut self.gitlab.private_token),
            (DIFY_API_KEY_ENV, &mut self.dify.api_key),
            (DIFY_KNOWLEDGE_BASE_ENV, &mut self.dify.knowledge_base_id),
        ];
        for (name, field) in overrides {
            if let Ok(value) = env::var(name) {
                if !value.trim().is_empty() {
                    info!(env = name, "Using value from environment");
                    *field = value.trim().to_string();
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("gitlab.host", &self.gitlab.host),
            ("gitlab.private_token", &self.gitlab.private_token),
            ("dify.host", &self.dify.host),
            ("dify.api_key", &self.dify.api_key),
            ("dify.knowledge_base_id", &self.dify.knowledge_base_id),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                bail!("Missing required config value `{key}`");
            }
        }
        if self.sync.max_retries == 0 {
            bail!("`sync.max_retries` must be at least 1");
        }
        if self.sync.page_size == 0 {
            bail!("`sync.page_size` must be at least 1");
        }
        if self.gitlab.allowed_file_extensions.is_empty() {
            bail!("`gitlab.allowed_file_extensions` must not be empty");
        }
        Ok(())
    }
}

/// Loads the YAML config at `path`, applies environment overrides and
/// validates it.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let mut config: CliConfig = serde_yaml::from_str(&config_content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        anyhow::anyhow!("Failed to parse config YAML: {e}")
    })?;
    info!(config_path = ?path_ref, "Parsed config YAML successfully");

    config.apply_env_overrides();
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {:?}", path_ref))?;

    config.sync_config().trace_loaded();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_section_defaults_apply_to_missing_keys() {
        let section: SyncSection = serde_yaml::from_str("cleanup_deleted: true").unwrap();
        assert!(section.cleanup_deleted);
        assert_eq!(section.max_retries, 3);
        assert_eq!(section.page_size, 100);
        assert!(section.enable_metadata);
    }
}
