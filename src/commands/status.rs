//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::ingest::IngestionJobSource;
use crate::readiness::{ReadinessService, StatusReport};
use tracing::info;

/// Readiness report for the knowledge base and one data source
pub async fn cmd_status(
    config: &Config,
    jobs: &dyn IngestionJobSource,
    source_id: Option<&str>,
) -> Result<StatusReport> {
    info!("Getting knowledge base status");
    ReadinessService::new(jobs, &config.ingestion)
        .status_report(source_id)
        .await
}

/// Print status to console
pub fn print_status(report: &StatusReport) {
    let kb = &report.knowledge_base;
    println!("\n📊 Knowledge base status\n");
    println!("Knowledge base: {} ({})", kb.name, kb.id);
    println!("  Status: {}", kb.status);
    println!("  Data source: {}", kb.data_source_id);

    let ready = if report.system_ready { "✓ Ready" } else { "✗ Not ready" };
    println!("\n{}: {}", ready, report.ready_message);

    println!("\nSummary:");
    println!(
        "  Latest job: {}",
        report
            .summary
            .latest_job_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    println!(
        "  Documents indexed (estimate): {}",
        report.summary.total_documents_indexed
    );
    println!("  Jobs in window: {}", report.summary.total_jobs);

    if report.ingestion_jobs.is_empty() {
        println!("\nNo ingestion jobs yet. Upload documents, then run 'kbctl sync'.");
        return;
    }

    println!("\nRecent jobs:");
    for job in &report.ingestion_jobs {
        let started = job
            .started_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        match &job.error {
            Some(error) => println!("• {} [{}] started {} (detail unavailable: {})", job.id, job.status, started, error),
            None => println!(
                "• {} [{}] started {}: scanned {}, indexed {}, failed {}",
                job.id,
                job.status,
                started,
                job.documents_scanned.unwrap_or(0),
                job.documents_indexed.unwrap_or(0),
                job.documents_failed.unwrap_or(0)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fake::{job, FakeJobSource};
    use crate::ingest::JobStatus;

    #[tokio::test]
    async fn test_status_uses_configured_source() {
        let source = FakeJobSource::new(
            "ACTIVE",
            vec![
                job("j2", JobStatus::InProgress, 0, 0, 0),
                job("j1", JobStatus::Complete, 10, 8, 2),
            ],
        );
        let mut config = Config::default();
        config.ingestion.data_source_id = "DS1".to_string();

        let report = cmd_status(&config, &source, None).await.unwrap();
        assert_eq!(report.knowledge_base.data_source_id, "DS1");
        assert!(!report.system_ready);
        assert!(report.has_documents);
        assert_eq!(report.summary.latest_job_status, Some(JobStatus::InProgress));
    }
}
