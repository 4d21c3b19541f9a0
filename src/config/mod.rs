//! Configuration management for kbctl
//!
//! Handles loading, saving, and validating configuration from TOML files.
//! Every field has a default, and the identifiers a serverless deployment
//! injects (endpoint, index name, knowledge base and data source ids) fall
//! back to environment variables, so the tool also runs without a file.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use crate::index::{DistanceMetric, HnswParams, MetadataPolicy};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Search collection connection
    #[serde(default)]
    pub search: SearchConfig,

    /// Target index definition
    #[serde(default)]
    pub index: IndexConfig,

    /// Retry budgets per backend operation
    #[serde(default)]
    pub retry: RetryConfig,

    /// Reconciliation timing
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Ingestion job API
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Search backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Collection endpoint URL
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Environment variable name for the API key (unset variable = no auth header)
    #[serde(default = "default_search_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

/// Index definition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_name")]
    pub name: String,

    /// Schema version tag; changing it triggers a rebuild
    #[serde(default = "default_target_version")]
    pub target_version: String,

    /// Must match the embedding model writing into the index
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    #[serde(default = "default_vector_field")]
    pub vector_field: String,

    #[serde(default = "default_text_field")]
    pub text_field: String,

    #[serde(default = "default_metric")]
    pub metric: DistanceMetric,

    /// k-NN engine name (e.g. faiss, nmslib, lucene)
    #[serde(default = "default_engine")]
    pub engine: String,

    #[serde(default = "default_ef_construction")]
    pub ef_construction: u32,

    #[serde(default = "default_hnsw_m")]
    pub m: u32,

    #[serde(default = "default_ef_search")]
    pub ef_search: u32,

    #[serde(default = "default_metadata_policy")]
    pub metadata_policy: MetadataPolicy,

    /// Shard count (omit for serverless collections, which reject it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shards: Option<u32>,

    /// Replica count (omit for serverless collections, which reject it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
}

/// Retry budgets per operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_exists_retry")]
    pub exists: RetryPolicy,

    #[serde(default = "default_create_retry")]
    pub create: RetryPolicy,

    #[serde(default = "default_delete_retry")]
    pub delete: RetryPolicy,

    #[serde(default = "default_verify_retry")]
    pub verify: RetryPolicy,
}

/// Reconciliation timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Probe the collection before touching indexes
    #[serde(default = "default_wait_for_ready")]
    pub wait_for_ready: bool,

    /// Maximum time to wait for the collection (seconds)
    #[serde(default = "default_probe_max_wait")]
    pub probe_max_wait_secs: u64,

    /// Interval between liveness probes (seconds)
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// Wait after deleting a stale index before recreating it (seconds)
    #[serde(default = "default_delete_settle")]
    pub delete_settle_secs: u64,

    /// Wait after creating an index before verifying it (seconds)
    #[serde(default = "default_create_settle")]
    pub create_settle_secs: u64,

    /// Read the new index back after creation (failures only warn)
    #[serde(default = "default_verify_after_create")]
    pub verify_after_create: bool,
}

/// Ingestion job API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_ingestion_api_url")]
    pub api_url: String,

    #[serde(default = "default_knowledge_base_id")]
    pub knowledge_base_id: String,

    /// Default data source when a command does not name one
    #[serde(default = "default_data_source_id")]
    pub data_source_id: String,

    #[serde(default = "default_ingestion_api_key_env")]
    pub api_key_env: String,

    /// Number of most recent jobs considered for readiness
    #[serde(default = "default_job_window")]
    pub job_window: usize,

    /// Number of newest jobs enriched with detailed statistics
    #[serde(default = "default_detail_limit")]
    pub detail_limit: usize,

    #[serde(default = "default_ingestion_timeout")]
    pub timeout_secs: u64,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for kbctl data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key_env: default_search_api_key_env(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: default_index_name(),
            target_version: default_target_version(),
            embedding_dimension: default_embedding_dimension(),
            vector_field: default_vector_field(),
            text_field: default_text_field(),
            metric: default_metric(),
            engine: default_engine(),
            ef_construction: default_ef_construction(),
            m: default_hnsw_m(),
            ef_search: default_ef_search(),
            metadata_policy: default_metadata_policy(),
            shards: None,
            replicas: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            exists: default_exists_retry(),
            create: default_create_retry(),
            delete: default_delete_retry(),
            verify: default_verify_retry(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            wait_for_ready: default_wait_for_ready(),
            probe_max_wait_secs: default_probe_max_wait(),
            probe_interval_secs: default_probe_interval(),
            delete_settle_secs: default_delete_settle(),
            create_settle_secs: default_create_settle(),
            verify_after_create: default_verify_after_create(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            api_url: default_ingestion_api_url(),
            knowledge_base_id: default_knowledge_base_id(),
            data_source_id: default_data_source_id(),
            api_key_env: default_ingestion_api_key_env(),
            job_window: default_job_window(),
            detail_limit: default_detail_limit(),
            timeout_secs: default_ingestion_timeout(),
        }
    }
}

impl IndexConfig {
    pub fn hnsw(&self) -> HnswParams {
        HnswParams {
            ef_construction: self.ef_construction,
            m: self.m,
            ef_search: self.ef_search,
        }
    }
}

impl ReconcileConfig {
    pub fn probe_max_wait(&self) -> Duration {
        Duration::from_secs(self.probe_max_wait_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn delete_settle(&self) -> Duration {
        Duration::from_secs(self.delete_settle_secs)
    }

    pub fn create_settle(&self) -> Duration {
        Duration::from_secs(self.create_settle_secs)
    }
}

impl Config {
    /// Get the default base directory for kbctl (~/.kbctl)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".kbctl")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from a file when it exists, otherwise run on (environment-driven) defaults
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self> {
        let path = config_path
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_config_path);

        if path.exists() {
            return Self::load(&path);
        }

        if config_path.is_some() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        debug!("No config file found, using defaults");
        let mut config = Config::default();
        config.init_paths(None);
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Get the search API key from environment
    pub fn search_api_key(&self) -> Option<String> {
        read_key(&self.search.api_key_env)
    }

    /// Get the ingestion API key from environment
    pub fn ingestion_api_key(&self) -> Option<String> {
        read_key(&self.ingestion.api_key_env)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.search.endpoint).map_err(|e| {
            Error::Config(format!(
                "search.endpoint '{}' is not a valid URL: {}",
                self.search.endpoint, e
            ))
        })?;

        Url::parse(&self.ingestion.api_url).map_err(|e| {
            Error::Config(format!(
                "ingestion.api_url '{}' is not a valid URL: {}",
                self.ingestion.api_url, e
            ))
        })?;

        validate_index_name(&self.index.name)?;

        if self.index.target_version.trim().is_empty() {
            return Err(Error::Config(
                "index.target_version must not be empty".to_string(),
            ));
        }

        if self.index.embedding_dimension == 0 {
            return Err(Error::Config(
                "index.embedding_dimension must be positive".to_string(),
            ));
        }

        for (name, policy) in [
            ("exists", &self.retry.exists),
            ("create", &self.retry.create),
            ("delete", &self.retry.delete),
            ("verify", &self.retry.verify),
        ] {
            policy
                .validate()
                .map_err(|e| Error::Config(format!("retry.{}: {}", name, e)))?;
        }

        if self.reconcile.probe_interval_secs == 0 {
            return Err(Error::Config(
                "reconcile.probe_interval_secs must be positive".to_string(),
            ));
        }

        if self.ingestion.job_window == 0 {
            return Err(Error::Config(
                "ingestion.job_window must be positive".to_string(),
            ));
        }

        if self.ingestion.detail_limit > self.ingestion.job_window {
            return Err(Error::Config(
                "ingestion.detail_limit must be <= ingestion.job_window".to_string(),
            ));
        }

        Ok(())
    }
}

const SECTION_COMMENTS: &[(&str, &str)] = &[
    ("[search]", "# Search collection (OpenSearch-compatible REST endpoint)"),
    ("[index]", "# Target index. Changing target_version rebuilds the index on the next reconcile."),
    ("[retry.exists]", "# Retry budgets per backend operation (delay = initial_delay_ms * backoff_factor^n)"),
    ("[reconcile]", "# Readiness probe and settle delays (seconds)"),
    ("[ingestion]", "# Ingestion job API"),
];

/// Render a config as TOML with a comment above each section
pub fn render_config_toml(config: &Config) -> Result<String> {
    let body = toml::to_string_pretty(config)?;
    let mut out = String::from(
        "# kbctl configuration\n# Unset fields fall back to defaults and environment variables.\n\n",
    );
    for line in body.lines() {
        if let Some((_, comment)) = SECTION_COMMENTS.iter().find(|(header, _)| line == *header) {
            out.push_str(comment);
            out.push('\n');
        }
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

fn read_key(env_name: &str) -> Option<String> {
    if env_name.is_empty() {
        return None;
    }
    std::env::var(env_name).ok().filter(|v| !v.is_empty())
}

/// OpenSearch index names: lowercase, no spaces or reserved characters
fn validate_index_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Config("index.name must not be empty".to_string()));
    }
    if name.starts_with(['_', '-', '+']) {
        return Err(Error::Config(format!(
            "index.name '{}' must not start with '_', '-' or '+'",
            name
        )));
    }
    let invalid = |c: char| {
        c.is_ascii_uppercase() || c.is_whitespace() || r#"\/*?"<>|,#:"#.contains(c)
    };
    if name.chars().any(invalid) {
        return Err(Error::Config(format!(
            "index.name '{}' must be lowercase without spaces or any of \\ / * ? \" < > | , # :",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.index.embedding_dimension, 1536);
        assert_eq!(config.index.metadata_policy, MetadataPolicy::DynamicUntyped);
        assert_eq!(config.retry.exists.max_attempts, 2);
        assert_eq!(config.retry.create.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.index.name = "test-index".to_string();
        config.index.target_version = "v7".to_string();

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load(&config.paths.config_file).unwrap();
        assert_eq!(loaded.index.name, "test-index");
        assert_eq!(loaded.index.target_version, "v7");
        assert_eq!(loaded.paths.base_dir, tmp.path());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[index]
name = "kb-index"
metric = "cosine"
metadata_policy = "static_typed"

[retry.create]
max_attempts = 5
initial_delay_ms = 500
backoff_factor = 3.0
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.index.name, "kb-index");
        assert_eq!(config.index.metric, DistanceMetric::Cosine);
        assert_eq!(config.index.metadata_policy, MetadataPolicy::StaticTyped);
        assert_eq!(config.index.ef_search, 512);
        assert_eq!(config.retry.create.max_attempts, 5);
        assert_eq!(config.retry.delete.max_attempts, 3);
        assert_eq!(config.reconcile.delete_settle_secs, 10);
    }

    #[test]
    fn test_rendered_config_round_trips() {
        let mut config = Config::default();
        config.index.shards = Some(1);
        let rendered = render_config_toml(&config).unwrap();
        assert!(rendered.starts_with("# kbctl configuration"));
        assert!(rendered.contains("# Ingestion job API\n[ingestion]"));

        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.index.shards, Some(1));
        assert_eq!(parsed.retry.verify, config.retry.verify);
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nope.toml");
        assert!(Config::load_or_default(Some(&path)).is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.index.name = "Bad Name".to_string();
        assert!(config.validate().is_err());
        config.index.name = "good-name".to_string();
        assert!(config.validate().is_ok());

        config.index.embedding_dimension = 0;
        assert!(config.validate().is_err());
        config.index.embedding_dimension = 768;

        config.retry.create.max_attempts = 0;
        assert!(config.validate().is_err());
        config.retry.create.max_attempts = 3;

        config.ingestion.detail_limit = config.ingestion.job_window + 1;
        assert!(config.validate().is_err());
        config.ingestion.detail_limit = 1;

        config.search.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
