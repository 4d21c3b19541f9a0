use super::{ClusterInfo, IndexMetadata, SearchAdmin};
use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::index::{IndexSchema, IndexVersion, VERSION_META_KEY};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Deserialize)]
struct RootResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    cluster_name: Option<String>,
    #[serde(default)]
    version: Option<RootVersion>,
}

#[derive(Debug, Deserialize)]
struct RootVersion {
    #[serde(default)]
    distribution: Option<String>,
    #[serde(default)]
    number: Option<String>,
}

/// OpenSearch-compatible index administration over HTTP
pub struct OpenSearchAdmin {
    client: Client,
    base_url: Url,
    endpoint: String,
}

impl OpenSearchAdmin {
    pub fn new(config: &SearchConfig, api_key: Option<String>) -> Result<Self> {
        let base_url = Url::parse(&config.endpoint)
            .map_err(|e| Error::Config(format!("Invalid search endpoint URL: {}", e)))?;

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(&format!("ApiKey {}", key))
                .map_err(|e| Error::Config(format!("Invalid search API key: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            endpoint: config.endpoint.clone(),
        })
    }

    fn index_url(&self, name: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Invalid search endpoint URL: {}", self.endpoint)))?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }

    /// Send a request; transport failures become `BackendUnavailable` when transient
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                Error::BackendUnavailable(e.to_string())
            } else {
                Error::Http(e)
            }
        })
    }

    async fn fail(response: Response) -> Error {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Error::from_status(status, &body)
    }

    async fn get_index_body(&self, name: &str) -> Result<Value> {
        let url = self.index_url(name)?;
        let response = self.send(self.client.get(url)).await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        let body: Value = response.json().await?;
        // Keyed by the concrete index name, which differs from `name` for aliases
        let entry = body
            .get(name)
            .cloned()
            .or_else(|| body.as_object().and_then(|m| m.values().next().cloned()))
            .ok_or_else(|| Error::IndexNotFound(name.to_string()))?;
        Ok(entry)
    }
}

#[async_trait]
impl SearchAdmin for OpenSearchAdmin {
    async fn probe_liveness(&self) -> Result<ClusterInfo> {
        let response = self.send(self.client.get(self.base_url.clone())).await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        let root: RootResponse = response.json().await?;
        let (distribution, version) = root
            .version
            .map(|v| (v.distribution, v.number))
            .unwrap_or((None, None));
        Ok(ClusterInfo {
            name: root.name,
            cluster_name: root.cluster_name,
            distribution,
            version,
        })
    }

    async fn index_exists(&self, name: &str) -> Result<bool> {
        let url = self.index_url(name)?;
        let response = self.send(self.client.head(url)).await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(Error::from_status(s.as_u16(), "")),
        }
    }

    async fn create_index(&self, name: &str, schema: &IndexSchema) -> Result<()> {
        let body = schema.to_request_body()?;
        let url = self.index_url(name)?;
        debug!(index = %name, version = %schema.version, "PUT index");

        let response = self.send(self.client.put(url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }
        info!(index = %name, version = %schema.version, "Index created");
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        let url = self.index_url(name)?;
        let response = self.send(self.client.delete(url)).await?;
        match response.status() {
            s if s.is_success() => {
                info!(index = %name, "Index deleted");
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                debug!(index = %name, "Index already gone");
                Ok(())
            }
            _ => Err(Self::fail(response).await),
        }
    }

    async fn index_version(&self, name: &str) -> Result<Option<IndexVersion>> {
        let entry = self.get_index_body(name).await?;
        Ok(version_from_entry(&entry))
    }

    async fn get_index(&self, name: &str) -> Result<IndexMetadata> {
        let entry = self.get_index_body(name).await?;

        let mut fields = BTreeMap::new();
        let mut vector_dimension = None;
        if let Some(props) = entry
            .pointer("/mappings/properties")
            .and_then(Value::as_object)
        {
            for (field, def) in props {
                let field_type = def
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("object")
                    .to_string();
                if field_type == "knn_vector" && vector_dimension.is_none() {
                    vector_dimension = def
                        .get("dimension")
                        .and_then(Value::as_u64)
                        .map(|d| d as usize);
                }
                fields.insert(field.clone(), field_type);
            }
        }

        let setting = |key: &str| {
            entry
                .pointer(&format!("/settings/index/{}", key))
                .and_then(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
        };

        Ok(IndexMetadata {
            name: name.to_string(),
            version: version_from_entry(&entry),
            fields,
            vector_dimension,
            shards: setting("number_of_shards"),
            replicas: setting("number_of_replicas"),
            created_at: setting("creation_date"),
        })
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn version_from_entry(entry: &Value) -> Option<IndexVersion> {
    entry
        .pointer(&format!("/mappings/_meta/{}", VERSION_META_KEY))
        .and_then(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(IndexVersion::new(s.as_str())),
            Value::Number(n) => Some(IndexVersion::new(n.to_string())),
            _ => None,
        })
}
