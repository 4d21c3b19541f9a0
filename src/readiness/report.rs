use super::{compute_readiness, ReadinessVerdict};
use crate::config::IngestionConfig;
use crate::error::{Error, Result};
use crate::ingest::{IngestionJob, IngestionJobSource, JobStatus, KnowledgeBaseInfo};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseSummary {
    pub id: String,
    pub name: String,
    pub status: String,
    pub data_source_id: String,
}

/// One job as shown in the status report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEntry {
    pub id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents_scanned: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents_failed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents_indexed: Option<u64>,
    /// Set when the detail read for this job failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobEntry {
    fn from_job(job: &IngestionJob) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status,
            started_at: job.started_at,
            completed_at: job.completed_at,
            documents_scanned: job.stats.map(|s| s.scanned),
            documents_failed: job.stats.map(|s| s.failed),
            documents_indexed: job.stats.map(|s| s.indexed()),
            error: None,
        }
    }

    fn failed(job: &IngestionJob, error: &Error) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status,
            started_at: None,
            completed_at: None,
            documents_scanned: None,
            documents_failed: None,
            documents_indexed: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub latest_job_status: Option<JobStatus>,
    pub total_documents_indexed: u64,
    pub total_jobs: usize,
    pub has_any_successful_jobs: bool,
}

/// Full readiness report for a knowledge base and one data source
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub success: bool,
    pub knowledge_base: KnowledgeBaseSummary,
    pub system_ready: bool,
    pub ready_message: String,
    pub has_documents: bool,
    pub ingestion_jobs: Vec<JobEntry>,
    pub summary: JobSummary,
    pub timestamp: DateTime<Utc>,
}

impl StatusReport {
    pub fn verdict(&self) -> ReadinessVerdict {
        ReadinessVerdict {
            system_ready: self.system_ready,
            message: self.ready_message.clone(),
            has_any_documents: self.has_documents,
            latest_job_status: self.summary.latest_job_status,
            total_documents_indexed: self.summary.total_documents_indexed,
        }
    }
}

/// Read-only readiness queries over an ingestion job source
pub struct ReadinessService<'a> {
    jobs: &'a dyn IngestionJobSource,
    default_source: String,
    job_window: usize,
    detail_limit: usize,
}

impl<'a> ReadinessService<'a> {
    pub fn new(jobs: &'a dyn IngestionJobSource, config: &IngestionConfig) -> Self {
        Self {
            jobs,
            default_source: config.data_source_id.clone(),
            job_window: config.job_window,
            detail_limit: config.detail_limit,
        }
    }

    fn source<'s>(&'s self, source_id: Option<&'s str>) -> Result<&'s str> {
        let source = source_id.unwrap_or(&self.default_source);
        if source.is_empty() {
            return Err(Error::Config(
                "No data source given (--source, ingestion.data_source_id or DATA_SOURCE_ID)"
                    .to_string(),
            ));
        }
        Ok(source)
    }

    /// Knowledge base, recent jobs (newest `detail_limit` enriched), and the verdict
    pub async fn status_report(&self, source_id: Option<&str>) -> Result<StatusReport> {
        let source = self.source(source_id)?;
        let kb = self.jobs.knowledge_base().await?;
        let summaries = self.jobs.list_recent_jobs(source, self.job_window).await?;

        let (jobs, entries) = self.enrich(source, summaries).await;
        let verdict = compute_readiness(&jobs, &kb.status);

        info!(
            ready = verdict.system_ready,
            latest_job = ?verdict.latest_job_status,
            has_documents = verdict.has_any_documents,
            "Knowledge base status"
        );

        Ok(build_report(kb, source, entries, jobs.len(), verdict))
    }

    /// Readiness only. Never fails: unreadable inputs mean "not ready"
    pub async fn get_readiness(&self, source_id: Option<&str>) -> ReadinessVerdict {
        match self.status_report(source_id).await {
            Ok(report) => report.verdict(),
            Err(e) => {
                warn!(error = %e, kind = %e.kind(), "Readiness read failed, reporting not ready");
                ReadinessVerdict::unavailable(e)
            }
        }
    }

    /// Replace the newest summaries with their detail records
    async fn enrich(
        &self,
        source: &str,
        summaries: Vec<IngestionJob>,
    ) -> (Vec<IngestionJob>, Vec<JobEntry>) {
        let mut jobs = Vec::with_capacity(summaries.len());
        let mut entries = Vec::with_capacity(self.detail_limit.min(summaries.len()));

        for (i, summary) in summaries.into_iter().enumerate() {
            if i >= self.detail_limit {
                jobs.push(summary);
                continue;
            }
            match self.jobs.get_job_detail(source, &summary.id).await {
                Ok(detail) => {
                    // list status wins; detail only fills in dates and counters
                    let merged = IngestionJob {
                        id: summary.id,
                        status: summary.status,
                        started_at: summary.started_at.or(detail.started_at),
                        completed_at: summary.completed_at.or(detail.completed_at),
                        stats: detail.stats.or(summary.stats),
                    };
                    entries.push(JobEntry::from_job(&merged));
                    jobs.push(merged);
                }
                Err(e) => {
                    warn!(job = %summary.id, error = %e, "Could not read job detail");
                    entries.push(JobEntry::failed(&summary, &e));
                    jobs.push(summary);
                }
            }
        }

        (jobs, entries)
    }
}

fn build_report(
    kb: KnowledgeBaseInfo,
    source: &str,
    entries: Vec<JobEntry>,
    total_jobs: usize,
    verdict: ReadinessVerdict,
) -> StatusReport {
    StatusReport {
        success: true,
        knowledge_base: KnowledgeBaseSummary {
            id: kb.id,
            name: kb.name,
            status: kb.status,
            data_source_id: source.to_string(),
        },
        system_ready: verdict.system_ready,
        ready_message: verdict.message,
        has_documents: verdict.has_any_documents,
        ingestion_jobs: entries,
        summary: JobSummary {
            latest_job_status: verdict.latest_job_status,
            total_documents_indexed: verdict.total_documents_indexed,
            total_jobs,
            has_any_successful_jobs: verdict.has_any_documents,
        },
        timestamp: Utc::now(),
    }
}
