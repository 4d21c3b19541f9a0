use super::{IngestionJob, IngestionJobSource, KnowledgeBaseInfo};
use crate::config::IngestionConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Clone, Serialize)]
struct StartJobRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JobListResponse {
    Jobs { jobs: Vec<IngestionJob> },
    Summaries {
        #[serde(rename = "ingestionJobSummaries")]
        summaries: Vec<IngestionJob>,
    },
    Bare(Vec<IngestionJob>),
}

impl JobListResponse {
    fn into_jobs(self) -> Vec<IngestionJob> {
        match self {
            JobListResponse::Jobs { jobs } => jobs,
            JobListResponse::Summaries { summaries } => summaries,
            JobListResponse::Bare(jobs) => jobs,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JobResponse {
    Wrapped {
        #[serde(alias = "ingestionJob")]
        job: IngestionJob,
    },
    Bare(IngestionJob),
}

impl JobResponse {
    fn into_job(self) -> IngestionJob {
        match self {
            JobResponse::Wrapped { job } => job,
            JobResponse::Bare(job) => job,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KnowledgeBaseResponse {
    Wrapped {
        #[serde(rename = "knowledgeBase")]
        knowledge_base: KnowledgeBaseInfo,
    },
    Bare(KnowledgeBaseInfo),
}

/// Ingestion job API over JSON HTTP
pub struct HttpJobSource {
    client: Client,
    base_url: Url,
    knowledge_base_id: String,
}

impl HttpJobSource {
    pub fn new(config: &IngestionConfig, api_key: Option<String>) -> Result<Self> {
        let base_url = Url::parse(&config.api_url)
            .map_err(|e| Error::Config(format!("Invalid ingestion API URL: {}", e)))?;
        if config.knowledge_base_id.is_empty() {
            return Err(Error::Config(
                "ingestion.knowledge_base_id is not set (config or KNOWLEDGE_BASE_ID)".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(&key)
                .map_err(|e| Error::Config(format!("Invalid ingestion API key: {}", e)))?;
            value.set_sensitive(true);
            headers.insert("x-api-key", value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            knowledge_base_id: config.knowledge_base_id.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Invalid ingestion API URL: {}", self.base_url)))?
            .pop_if_empty()
            .push("knowledge-bases")
            .push(&self.knowledge_base_id)
            .extend(segments);
        Ok(url)
    }

    fn jobs_endpoint(&self, source_id: &str, tail: &[&str]) -> Result<Url> {
        let mut segments = vec!["sources", source_id, "jobs"];
        segments.extend_from_slice(tail);
        self.endpoint(&segments)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            401 | 403 => Error::Authorization(format!("ingestion API: {}", body.trim())),
            code => Error::Ingestion(format!("HTTP {}: {}", code, body.trim())),
        })
    }
}

#[async_trait]
impl IngestionJobSource for HttpJobSource {
    async fn knowledge_base(&self) -> Result<KnowledgeBaseInfo> {
        let url = self.endpoint(&[])?;
        let response = Self::check(self.client.get(url).send().await?).await?;
        Ok(match response.json::<KnowledgeBaseResponse>().await? {
            KnowledgeBaseResponse::Wrapped { knowledge_base } => knowledge_base,
            KnowledgeBaseResponse::Bare(kb) => kb,
        })
    }

    async fn list_recent_jobs(&self, source_id: &str, limit: usize) -> Result<Vec<IngestionJob>> {
        let mut url = self.jobs_endpoint(source_id, &[])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());

        let response = Self::check(self.client.get(url).send().await?).await?;
        let mut jobs = response.json::<JobListResponse>().await?.into_jobs();

        // Newest first regardless of server ordering; undated jobs go last
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs.truncate(limit);
        debug!(source = %source_id, count = jobs.len(), "Listed ingestion jobs");
        Ok(jobs)
    }

    async fn get_job_detail(&self, source_id: &str, job_id: &str) -> Result<IngestionJob> {
        let url = self.jobs_endpoint(source_id, &[job_id])?;
        let response = Self::check(self.client.get(url).send().await?).await?;
        Ok(response.json::<JobResponse>().await?.into_job())
    }

    async fn start_job(&self, source_id: &str, description: Option<&str>) -> Result<IngestionJob> {
        let url = self.jobs_endpoint(source_id, &[])?;
        let request = StartJobRequest { description };
        let response = Self::check(self.client.post(url).json(&request).send().await?).await?;
        let job = response.json::<JobResponse>().await?.into_job();
        info!(source = %source_id, job = %job.id, status = %job.status, "Ingestion job started");
        Ok(job)
    }

    fn knowledge_base_id(&self) -> &str {
        &self.knowledge_base_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ingest::JobStatus;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer, api_key: Option<&str>) -> HttpJobSource {
        let config = IngestionConfig {
            api_url: server.uri(),
            knowledge_base_id: "KB123".to_string(),
            data_source_id: "DS1".to_string(),
            api_key_env: String::new(),
            job_window: 10,
            detail_limit: 5,
            timeout_secs: 5,
        };
        HttpJobSource::new(&config, api_key.map(str::to_string)).unwrap()
    }

    #[tokio::test]
    async fn test_knowledge_base() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/knowledge-bases/KB123"))
            .and(header("x-api-key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "knowledgeBase": { "knowledgeBaseId": "KB123", "name": "docs", "status": "ACTIVE" }
            })))
            .mount(&server)
            .await;

        let kb = source(&server, Some("k")).knowledge_base().await.unwrap();
        assert_eq!(kb.name, "docs");
        assert!(kb.is_active());
    }

    #[tokio::test]
    async fn test_list_sorted_newest_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/knowledge-bases/KB123/sources/DS1/jobs"))
            .and(query_param("limit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobs": [
                    { "id": "old", "status": "COMPLETE", "startedAt": "2026-01-01T00:00:00Z" },
                    { "id": "new", "status": "IN_PROGRESS", "startedAt": "2026-01-03T00:00:00Z" },
                    { "id": "mid", "status": "STOPPED", "startedAt": "2026-01-02T00:00:00Z" }
                ]
            })))
            .mount(&server)
            .await;

        let jobs = source(&server, None).list_recent_jobs("DS1", 10).await.unwrap();
        let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
        assert_eq!(jobs[1].status, JobStatus::Unknown);
    }

    #[tokio::test]
    async fn test_job_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/knowledge-bases/KB123/sources/DS1/jobs/J1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ingestionJob": {
                    "ingestionJobId": "J1",
                    "status": "COMPLETE",
                    "statistics": {
                        "numberOfDocumentsScanned": 10,
                        "numberOfNewDocumentsIndexed": 8,
                        "numberOfModifiedDocumentsIndexed": 2
                    }
                }
            })))
            .mount(&server)
            .await;

        let job = source(&server, None).get_job_detail("DS1", "J1").await.unwrap();
        assert_eq!(job.indexed(), 10);
        assert_eq!(job.stats.unwrap().scanned, 10);
    }

    #[tokio::test]
    async fn test_start_job() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/knowledge-bases/KB123/sources/DS1/jobs"))
            .and(body_json(json!({ "description": "manual sync" })))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "job": { "id": "J9", "status": "IN_PROGRESS" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let job = source(&server, None)
            .start_job("DS1", Some("manual sync"))
            .await
            .unwrap();
        assert_eq!(job.id, "J9");
        assert_eq!(job.status, JobStatus::InProgress);
    }

    #[tokio::test]
    async fn test_forbidden_is_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("AccessDenied"))
            .mount(&server)
            .await;

        let err = source(&server, None).knowledge_base().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn test_missing_knowledge_base_id() {
        let config = IngestionConfig {
            knowledge_base_id: String::new(),
            api_url: "http://localhost:8080".to_string(),
            ..IngestionConfig::default()
        };
        assert!(HttpJobSource::new(&config, None).is_err());
    }
}
