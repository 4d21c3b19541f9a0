//! Manual ingestion trigger

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ingest::{IngestionJob, IngestionJobSource};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub knowledge_base_id: String,
    pub data_source_id: String,
    pub job: IngestionJob,
    /// Set when the follow-up detail read failed; the job was still started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_error: Option<String>,
}

/// Start an ingestion job and read its detail right away
pub async fn cmd_sync(
    config: &Config,
    jobs: &dyn IngestionJobSource,
    source_id: Option<&str>,
    description: Option<&str>,
) -> Result<SyncResult> {
    let source = source_id.unwrap_or(&config.ingestion.data_source_id);
    if source.is_empty() {
        return Err(Error::Config(
            "No data source given (--source, ingestion.data_source_id or DATA_SOURCE_ID)"
                .to_string(),
        ));
    }

    info!(source = %source, "Starting ingestion job");
    let started = jobs.start_job(source, description).await?;

    let (job, detail_error) = match jobs.get_job_detail(source, &started.id).await {
        Ok(detail) => (detail, None),
        Err(e) => {
            warn!(job = %started.id, error = %e, "Job started but its status could not be read");
            (started, Some(e.to_string()))
        }
    };

    Ok(SyncResult {
        knowledge_base_id: jobs.knowledge_base_id().to_string(),
        data_source_id: source.to_string(),
        job,
        detail_error,
    })
}

pub fn print_sync(result: &SyncResult) {
    println!("\n🔄 Ingestion job started\n");
    println!("  Job: {}", result.job.id);
    println!("  Status: {}", result.job.status);
    println!("  Knowledge base: {}", result.knowledge_base_id);
    println!("  Data source: {}", result.data_source_id);
    if let Some(error) = &result.detail_error {
        println!("  ⚠ Status could not be confirmed: {}", error);
    }
    println!("\nRun 'kbctl status' to follow progress.");
}
