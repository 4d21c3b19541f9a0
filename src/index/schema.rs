//! Target index definition and its validation

use crate::config::IndexConfig;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

/// Mapping `_meta` key holding the schema version tag
pub const VERSION_META_KEY: &str = "schema_version";

/// Name of the metadata object written by the ingestion job
pub const METADATA_FIELD: &str = "metadata";

/// Largest vector dimension accepted by the k-NN plugin
pub const MAX_DIMENSION: usize = 16_000;

const KNOWN_ENGINES: &[&str] = &["faiss", "nmslib", "lucene"];

/// Schema version tag stored on the live index (e.g. "v3")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexVersion(String);

impl IndexVersion {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric part of tags like "v3" or "12", when there is one
    pub fn ordinal(&self) -> Option<u64> {
        self.0
            .strip_prefix(['v', 'V'])
            .unwrap_or(&self.0)
            .parse()
            .ok()
    }
}

impl fmt::Display for IndexVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for IndexVersion {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ValidationError::InvalidParameter(
                "index version must not be empty".to_string(),
            ));
        }
        Ok(Self::new(s))
    }
}

/// Vector distance metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    L2,
    #[serde(alias = "cosinesimil")]
    Cosine,
    #[serde(alias = "innerproduct", alias = "dot_product")]
    Dot,
}

impl DistanceMetric {
    /// k-NN plugin `space_type` name
    pub fn space_type(&self) -> &'static str {
        match self {
            DistanceMetric::L2 => "l2",
            DistanceMetric::Cosine => "cosinesimil",
            DistanceMetric::Dot => "innerproduct",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.space_type())
    }
}

/// How the metadata object is mapped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataPolicy {
    /// Predefine `metadata.source` and `metadata.document_id` as keywords
    StaticTyped,
    /// Leave the metadata mapping out; the backend infers types on first write.
    /// A static object mapping breaks ingestion as soon as a job writes a
    /// scalar where the mapping declares an object.
    DynamicUntyped,
}

/// Mapping field types this crate knows about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    KnnVector,
    Text,
    Keyword,
    Object,
    #[serde(untagged)]
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::KnnVector => "knn_vector",
            FieldType::Text => "text",
            FieldType::Keyword => "keyword",
            FieldType::Object => "object",
            FieldType::Other(name) => name,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HNSW graph parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswParams {
    pub ef_construction: u32,
    pub m: u32,
    pub ef_search: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorField {
    pub name: String,
    pub field_type: FieldType,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub engine: String,
    pub hnsw: HnswParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextField {
    pub name: String,
    pub field_type: FieldType,
}

/// Complete definition of the index to create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub version: IndexVersion,
    pub vector_field: Option<VectorField>,
    pub text_field: Option<TextField>,
    pub metadata_policy: MetadataPolicy,
    pub shards: Option<u32>,
    pub replicas: Option<u32>,
}

/// Produces [`IndexSchema`] values from the configured index settings
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    vector_field: String,
    text_field: String,
    metric: DistanceMetric,
    engine: String,
    hnsw: HnswParams,
    metadata_policy: MetadataPolicy,
    shards: Option<u32>,
    replicas: Option<u32>,
}

impl SchemaBuilder {
    pub fn from_config(config: &IndexConfig) -> Self {
        Self {
            vector_field: config.vector_field.clone(),
            text_field: config.text_field.clone(),
            metric: config.metric,
            engine: config.engine.clone(),
            hnsw: config.hnsw(),
            metadata_policy: config.metadata_policy,
            shards: config.shards,
            replicas: config.replicas,
        }
    }

    pub fn with_metadata_policy(mut self, policy: MetadataPolicy) -> Self {
        self.metadata_policy = policy;
        self
    }

    pub fn build(&self, target_version: &IndexVersion, embedding_dimension: usize) -> IndexSchema {
        IndexSchema {
            version: target_version.clone(),
            vector_field: Some(VectorField {
                name: self.vector_field.clone(),
                field_type: FieldType::KnnVector,
                dimension: embedding_dimension,
                metric: self.metric,
                engine: self.engine.clone(),
                hnsw: self.hnsw,
            }),
            text_field: Some(TextField {
                name: self.text_field.clone(),
                field_type: FieldType::Text,
            }),
            metadata_policy: self.metadata_policy,
            shards: self.shards,
            replicas: self.replicas,
        }
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::from_config(&IndexConfig::default())
    }
}

impl IndexSchema {
    /// Check required fields, field types and parameter ranges
    pub fn validate(&self) -> Result<(), ValidationError> {
        let vector = self
            .vector_field
            .as_ref()
            .ok_or_else(|| ValidationError::MissingField("vector".to_string()))?;
        let text = self
            .text_field
            .as_ref()
            .ok_or_else(|| ValidationError::MissingField("text".to_string()))?;

        if vector.field_type != FieldType::KnnVector {
            return Err(ValidationError::WrongFieldType {
                field: vector.name.clone(),
                expected: FieldType::KnnVector.to_string(),
                found: vector.field_type.to_string(),
            });
        }
        if text.field_type != FieldType::Text {
            return Err(ValidationError::WrongFieldType {
                field: text.name.clone(),
                expected: FieldType::Text.to_string(),
                found: text.field_type.to_string(),
            });
        }

        if vector.name.is_empty() || text.name.is_empty() {
            return Err(ValidationError::InvalidParameter(
                "field names must not be empty".to_string(),
            ));
        }
        if vector.name == text.name || vector.name == METADATA_FIELD || text.name == METADATA_FIELD
        {
            return Err(ValidationError::InvalidParameter(format!(
                "field names must be distinct (vector '{}', text '{}', '{}')",
                vector.name, text.name, METADATA_FIELD
            )));
        }

        if vector.dimension == 0 || vector.dimension > MAX_DIMENSION {
            return Err(ValidationError::InvalidParameter(format!(
                "dimension must be between 1 and {} (got {})",
                MAX_DIMENSION, vector.dimension
            )));
        }
        if !KNOWN_ENGINES.contains(&vector.engine.as_str()) {
            return Err(ValidationError::InvalidParameter(format!(
                "unknown k-NN engine '{}' (expected one of {})",
                vector.engine,
                KNOWN_ENGINES.join(", ")
            )));
        }
        let hnsw = vector.hnsw;
        if hnsw.m == 0 || hnsw.ef_construction == 0 || hnsw.ef_search == 0 {
            return Err(ValidationError::InvalidParameter(
                "HNSW parameters m, ef_construction and ef_search must be positive".to_string(),
            ));
        }
        if self.version.as_str().is_empty() {
            return Err(ValidationError::InvalidParameter(
                "index version must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Index creation body: settings plus mappings, version tag in `_meta`
    pub fn to_request_body(&self) -> Result<Value, ValidationError> {
        self.validate()?;
        let (Some(vector), Some(text)) = (&self.vector_field, &self.text_field) else {
            return Err(ValidationError::MissingField("vector".to_string()));
        };

        let mut index_settings = Map::new();
        index_settings.insert("knn".to_string(), json!(true));
        index_settings.insert(
            "knn.algo_param.ef_search".to_string(),
            json!(vector.hnsw.ef_search),
        );
        if let Some(shards) = self.shards {
            index_settings.insert("number_of_shards".to_string(), json!(shards));
        }
        if let Some(replicas) = self.replicas {
            index_settings.insert("number_of_replicas".to_string(), json!(replicas));
        }

        let mut properties = Map::new();
        properties.insert(
            vector.name.clone(),
            json!({
                "type": vector.field_type.as_str(),
                "dimension": vector.dimension,
                "method": {
                    "name": "hnsw",
                    "engine": vector.engine,
                    "space_type": vector.metric.space_type(),
                    "parameters": {
                        "ef_construction": vector.hnsw.ef_construction,
                        "m": vector.hnsw.m,
                        "ef_search": vector.hnsw.ef_search,
                    }
                }
            }),
        );
        properties.insert(text.name.clone(), json!({ "type": text.field_type.as_str() }));

        if self.metadata_policy == MetadataPolicy::StaticTyped {
            properties.insert(
                METADATA_FIELD.to_string(),
                json!({
                    "type": "object",
                    "dynamic": true,
                    "properties": {
                        "source": { "type": "keyword" },
                        "document_id": { "type": "keyword" }
                    }
                }),
            );
        }

        Ok(json!({
            "settings": { "index": Value::Object(index_settings) },
            "mappings": {
                "_meta": { VERSION_META_KEY: self.version.as_str() },
                "properties": Value::Object(properties)
            }
        }))
    }
}
