//! Knowledge-base readiness
//!
//! Folds a window of recent ingestion jobs into one verdict: can queries be
//! served meaningfully right now. The newest job decides the message; older
//! jobs are only consulted so that one failed run does not mark a populated
//! knowledge base as unusable.

mod report;

pub use report::*;

use crate::ingest::{IngestionJob, JobStatus, KB_STATUS_ACTIVE};
use serde::Serialize;

const MSG_EMPTY: &str = "Knowledge base is empty! Please upload documents first.";
const MSG_PROCESSING: &str = "Processing documents, please wait...";
const MSG_FAILED: &str = "Recent indexing job failed, some documents may not be queryable.";
const MSG_DEGRADED: &str =
    "Latest indexing job failed, but previously indexed documents remain queryable.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessVerdict {
    pub system_ready: bool,
    pub message: String,
    pub has_any_documents: bool,
    pub latest_job_status: Option<JobStatus>,
    /// Best-effort estimate: the largest scanned count among completed jobs
    /// that indexed something. There is no authoritative document count.
    pub total_documents_indexed: u64,
}

impl ReadinessVerdict {
    /// Verdict used when the inputs could not be read at all
    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self {
            system_ready: false,
            message: format!("Readiness could not be determined: {}", reason),
            has_any_documents: false,
            latest_job_status: None,
            total_documents_indexed: 0,
        }
    }
}

/// Compute readiness from jobs ordered newest first
pub fn compute_readiness(jobs: &[IngestionJob], index_status: &str) -> ReadinessVerdict {
    let has_any_documents = jobs.iter().any(IngestionJob::indexed_documents);
    let total_documents_indexed = jobs
        .iter()
        .filter(|j| j.indexed_documents())
        .filter_map(|j| j.stats.map(|s| s.scanned))
        .max()
        .unwrap_or(0);
    let latest_job_status = jobs.first().map(|j| j.status);

    let verdict = |system_ready: bool, message: String| ReadinessVerdict {
        system_ready,
        message,
        has_any_documents,
        latest_job_status,
        total_documents_indexed,
    };

    if index_status != KB_STATUS_ACTIVE {
        return verdict(
            false,
            format!("Knowledge base status is abnormal: {}", index_status),
        );
    }

    let Some(latest) = jobs.first() else {
        return verdict(false, MSG_EMPTY.to_string());
    };

    match latest.status {
        JobStatus::Complete if has_any_documents => {
            verdict(true, ready_message(total_documents_indexed))
        }
        JobStatus::Complete => verdict(false, MSG_EMPTY.to_string()),
        JobStatus::InProgress => verdict(false, MSG_PROCESSING.to_string()),
        JobStatus::Failed => {
            if jobs[1..].iter().any(IngestionJob::indexed_documents) {
                verdict(true, MSG_DEGRADED.to_string())
            } else {
                verdict(false, MSG_FAILED.to_string())
            }
        }
        JobStatus::Unknown => verdict(false, "Knowledge base state is unknown.".to_string()),
    }
}

fn ready_message(count: u64) -> String {
    if count > 0 {
        format!(
            "System is ready! {} documents have been indexed and queries can begin.",
            count
        )
    } else {
        "System is ready! Documents have been indexed and queries can begin.".to_string()
    }
}
