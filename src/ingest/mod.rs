//! Ingestion job records and the API that owns them
//!
//! Jobs are created and advanced by an external indexing system; this crate
//! only reads a bounded window of them (and can ask for a new one).

mod http_backend;

pub use http_backend::*;

use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Knowledge base status meaning "serving"
pub const KB_STATUS_ACTIVE: &str = "ACTIVE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    InProgress,
    Complete,
    Failed,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Complete => "COMPLETE",
            JobStatus::Failed => "FAILED",
            JobStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-job document counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatistics {
    #[serde(default, alias = "numberOfDocumentsScanned")]
    pub scanned: u64,
    #[serde(default, alias = "numberOfDocumentsFailed")]
    pub failed: u64,
    #[serde(default, alias = "numberOfNewDocumentsIndexed")]
    pub new_indexed: u64,
    #[serde(default, alias = "numberOfModifiedDocumentsIndexed")]
    pub modified_indexed: u64,
}

impl JobStatistics {
    /// Documents written to the index by this job
    pub fn indexed(&self) -> u64 {
        self.new_indexed + self.modified_indexed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionJob {
    #[serde(alias = "ingestionJobId")]
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Absent on list summaries that were not enriched with detail
    #[serde(default, alias = "statistics", skip_serializing_if = "Option::is_none")]
    pub stats: Option<JobStatistics>,
}

impl IngestionJob {
    pub fn indexed(&self) -> u64 {
        self.stats.map(|s| s.indexed()).unwrap_or(0)
    }

    /// Finished successfully and wrote at least one document
    pub fn indexed_documents(&self) -> bool {
        self.status == JobStatus::Complete && self.indexed() > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseInfo {
    #[serde(alias = "knowledgeBaseId")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub status: String,
}

impl KnowledgeBaseInfo {
    pub fn is_active(&self) -> bool {
        self.status == KB_STATUS_ACTIVE
    }
}

/// Read access to ingestion jobs, plus a manual trigger
#[async_trait]
pub trait IngestionJobSource: Send + Sync {
    async fn knowledge_base(&self) -> Result<KnowledgeBaseInfo>;

    /// Most recent jobs of `source_id`, newest first, at most `limit`
    async fn list_recent_jobs(&self, source_id: &str, limit: usize) -> Result<Vec<IngestionJob>>;

    /// Full record including statistics
    async fn get_job_detail(&self, source_id: &str, job_id: &str) -> Result<IngestionJob>;

    async fn start_job(&self, source_id: &str, description: Option<&str>) -> Result<IngestionJob>;

    fn knowledge_base_id(&self) -> &str;
}

/// Build the configured ingestion job API client
pub fn create_job_source(config: &Config) -> Result<Box<dyn IngestionJobSource>> {
    let source = HttpJobSource::new(&config.ingestion, config.ingestion_api_key())?;
    Ok(Box::new(source))
}

#[cfg(test)]
pub(crate) mod fake {
    //! Canned job source for readiness tests

    use super::*;
    use crate::error::Error;
    use std::collections::HashSet;
    use std::sync::Mutex;

    pub fn job(id: &str, status: JobStatus, scanned: u64, new: u64, modified: u64) -> IngestionJob {
        IngestionJob {
            id: id.to_string(),
            status,
            started_at: None,
            completed_at: None,
            stats: Some(JobStatistics {
                scanned,
                failed: 0,
                new_indexed: new,
                modified_indexed: modified,
            }),
        }
    }

    pub struct FakeJobSource {
        pub kb: KnowledgeBaseInfo,
        pub jobs: Vec<IngestionJob>,
        pub fail_kb: bool,
        pub fail_list: bool,
        pub fail_detail: HashSet<String>,
        pub started: Mutex<Vec<String>>,
        pub detail_calls: Mutex<Vec<String>>,
    }

    impl FakeJobSource {
        pub fn new(status: &str, jobs: Vec<IngestionJob>) -> Self {
            Self {
                kb: KnowledgeBaseInfo {
                    id: "KB123".to_string(),
                    name: "docs".to_string(),
                    status: status.to_string(),
                },
                jobs,
                fail_kb: false,
                fail_list: false,
                fail_detail: HashSet::new(),
                started: Mutex::new(Vec::new()),
                detail_calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl IngestionJobSource for FakeJobSource {
        async fn knowledge_base(&self) -> Result<KnowledgeBaseInfo> {
            if self.fail_kb {
                return Err(Error::Authorization("kb read denied".to_string()));
            }
            Ok(self.kb.clone())
        }

        async fn list_recent_jobs(&self, _source_id: &str, limit: usize) -> Result<Vec<IngestionJob>> {
            if self.fail_list {
                return Err(Error::Ingestion("list failed".to_string()));
            }
            // summaries carry no statistics
            Ok(self
                .jobs
                .iter()
                .take(limit)
                .map(|j| IngestionJob {
                    stats: None,
                    ..j.clone()
                })
                .collect())
        }

        async fn get_job_detail(&self, _source_id: &str, job_id: &str) -> Result<IngestionJob> {
            self.detail_calls.lock().unwrap().push(job_id.to_string());
            if self.fail_detail.contains(job_id) {
                return Err(Error::Ingestion(format!("detail for {} unavailable", job_id)));
            }
            self.jobs
                .iter()
                .find(|j| j.id == job_id)
                .cloned()
                .ok_or_else(|| Error::Ingestion(format!("no job {}", job_id)))
        }

        async fn start_job(&self, _source_id: &str, _description: Option<&str>) -> Result<IngestionJob> {
            let id = format!("job-{}", self.started.lock().unwrap().len() + 1);
            self.started.lock().unwrap().push(id.clone());
            Ok(IngestionJob {
                id,
                status: JobStatus::Unknown,
                started_at: None,
                completed_at: None,
                stats: None,
            })
        }

        fn knowledge_base_id(&self) -> &str {
            &self.kb.id
        }
    }
}
