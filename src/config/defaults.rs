//! Default values for configuration

use crate::index::{DistanceMetric, MetadataPolicy};
use crate::retry::RetryPolicy;

/// Default search collection endpoint (OpenSearch-compatible REST API)
pub fn default_search_endpoint() -> String {
    std::env::var("SEARCH_ENDPOINT").unwrap_or_else(|_| "http://127.0.0.1:9200".to_string())
}

/// Default environment variable holding the search API key
pub fn default_search_api_key_env() -> String {
    "SEARCH_API_KEY".to_string()
}

/// Default per-request timeout against the search backend
pub fn default_search_timeout() -> u64 {
    60
}

/// Default index name
pub fn default_index_name() -> String {
    std::env::var("INDEX_NAME").unwrap_or_else(|_| "bedrock-knowledge-base-default-index".to_string())
}

/// Default schema version tag written on newly created indexes
pub fn default_target_version() -> String {
    "v3".to_string()
}

/// Default embedding dimension (Titan text embeddings)
pub fn default_embedding_dimension() -> usize {
    1536
}

pub fn default_vector_field() -> String {
    "bedrock-knowledge-base-vector".to_string()
}

pub fn default_text_field() -> String {
    "text".to_string()
}

pub fn default_metric() -> DistanceMetric {
    DistanceMetric::L2
}

pub fn default_engine() -> String {
    "faiss".to_string()
}

pub fn default_ef_construction() -> u32 {
    512
}

pub fn default_hnsw_m() -> u32 {
    16
}

pub fn default_ef_search() -> u32 {
    512
}

/// Let the backend infer metadata field types on first write
pub fn default_metadata_policy() -> MetadataPolicy {
    MetadataPolicy::DynamicUntyped
}

/// Existence checks get a smaller budget; failure means "assume absent"
pub fn default_exists_retry() -> RetryPolicy {
    RetryPolicy::new(2, 2_000, 2.0)
}

pub fn default_create_retry() -> RetryPolicy {
    RetryPolicy::new(3, 1_000, 2.0)
}

pub fn default_delete_retry() -> RetryPolicy {
    RetryPolicy::new(3, 2_000, 2.0)
}

pub fn default_verify_retry() -> RetryPolicy {
    RetryPolicy::new(3, 2_000, 2.0)
}

/// Default: wait for the collection to answer before touching indexes
pub fn default_wait_for_ready() -> bool {
    true
}

/// Default maximum wait for the collection to become ready (seconds)
pub fn default_probe_max_wait() -> u64 {
    120
}

/// Default interval between liveness probes (seconds)
pub fn default_probe_interval() -> u64 {
    5
}

/// Default settle delay after deleting an index (seconds)
pub fn default_delete_settle() -> u64 {
    10
}

/// Default settle delay after creating an index (seconds)
pub fn default_create_settle() -> u64 {
    10
}

pub fn default_verify_after_create() -> bool {
    true
}

/// Default ingestion job API base URL
pub fn default_ingestion_api_url() -> String {
    std::env::var("INGESTION_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string())
}

pub fn default_knowledge_base_id() -> String {
    std::env::var("KNOWLEDGE_BASE_ID").unwrap_or_default()
}

pub fn default_data_source_id() -> String {
    std::env::var("DATA_SOURCE_ID").unwrap_or_default()
}

pub fn default_ingestion_api_key_env() -> String {
    "INGESTION_API_KEY".to_string()
}

/// Default number of recent jobs considered for readiness
pub fn default_job_window() -> usize {
    10
}

/// Default number of newest jobs enriched with detailed statistics
pub fn default_detail_limit() -> usize {
    5
}

pub fn default_ingestion_timeout() -> u64 {
    30
}
