//! Health check across the search collection and the ingestion API

use crate::config::Config;
use crate::error::Error;
use crate::ingest::IngestionJobSource;
use crate::search::SearchAdmin;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub message: String,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Ok,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Warning,
            message: message.into(),
        }
    }

    fn error(e: &Error) -> Self {
        Self {
            status: CheckStatus::Error,
            message: format!("{} ({})", e, e.kind().remedy()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: OverallHealth,
    pub checks: BTreeMap<String, CheckResult>,
    pub timestamp: DateTime<Utc>,
}

/// Run every check; failures are reported, not returned
pub async fn cmd_health(
    config: &Config,
    admin: &dyn SearchAdmin,
    jobs: std::result::Result<&dyn IngestionJobSource, &Error>,
) -> HealthReport {
    let mut checks = BTreeMap::new();

    let search = match admin.probe_liveness().await {
        Ok(info) => CheckResult::ok(format!(
            "{} {} at {}",
            info.distribution.as_deref().unwrap_or("search"),
            info.version.as_deref().unwrap_or("(version unknown)"),
            admin.endpoint()
        )),
        Err(e) => CheckResult::error(&e),
    };
    checks.insert("search".to_string(), search);

    match jobs {
        Ok(jobs) => {
            let kb = match jobs.knowledge_base().await {
                Ok(kb) if kb.is_active() => CheckResult::ok(format!("{} is ACTIVE", kb.id)),
                Ok(kb) => CheckResult::warning(format!("{} status is {}", kb.id, kb.status)),
                Err(e) => CheckResult::error(&e),
            };
            checks.insert("knowledge_base".to_string(), kb);

            let source = &config.ingestion.data_source_id;
            let job_api = if source.is_empty() {
                CheckResult::warning("No data source configured")
            } else {
                match jobs.list_recent_jobs(source, 1).await {
                    Ok(recent) => CheckResult::ok(match recent.first() {
                        Some(job) => format!("latest job {} is {}", job.id, job.status),
                        None => "no jobs yet".to_string(),
                    }),
                    Err(e) => CheckResult::error(&e),
                }
            };
            checks.insert("ingestion_jobs".to_string(), job_api);
        }
        Err(e) => {
            checks.insert("knowledge_base".to_string(), CheckResult::error(e));
        }
    }

    let status = if checks.values().all(|c| c.status == CheckStatus::Ok) {
        OverallHealth::Healthy
    } else {
        OverallHealth::Degraded
    };
    debug!(?status, "Health check finished");

    HealthReport {
        status,
        checks,
        timestamp: Utc::now(),
    }
}

pub fn print_health(report: &HealthReport) {
    let headline = match report.status {
        OverallHealth::Healthy => "✓ healthy",
        OverallHealth::Degraded => "⚠ degraded",
    };
    println!("\n🩺 Health: {}\n", headline);
    for (name, check) in &report.checks {
        let mark = match check.status {
            CheckStatus::Ok => "✓",
            CheckStatus::Warning => "⚠",
            CheckStatus::Error => "✗",
        };
        println!("  {} {}: {}", mark, name, check.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fake::FakeJobSource;
    use crate::search::fake::{FakeSearch, Op};

    fn config() -> Config {
        let mut config = Config::default();
        config.ingestion.data_source_id = "DS1".to_string();
        config
    }

    #[tokio::test]
    async fn test_all_ok_is_healthy() {
        let search = FakeSearch::new();
        let jobs = FakeJobSource::new("ACTIVE", vec![]);
        let report = cmd_health(&config(), &search, Ok(&jobs)).await;

        assert_eq!(report.status, OverallHealth::Healthy);
        assert_eq!(report.checks.len(), 3);
    }

    #[tokio::test]
    async fn test_inactive_knowledge_base_is_warning() {
        let search = FakeSearch::new();
        let jobs = FakeJobSource::new("UPDATING", vec![]);
        let report = cmd_health(&config(), &search, Ok(&jobs)).await;

        assert_eq!(report.status, OverallHealth::Degraded);
        assert_eq!(report.checks["knowledge_base"].status, CheckStatus::Warning);
    }

    #[tokio::test]
    async fn test_unreachable_search_is_degraded() {
        let search = FakeSearch::new();
        search.fail_next(Op::Probe, Error::BackendUnavailable("connect refused".to_string()));
        let jobs = FakeJobSource::new("ACTIVE", vec![]);
        let report = cmd_health(&config(), &search, Ok(&jobs)).await;

        assert_eq!(report.status, OverallHealth::Degraded);
        assert_eq!(report.checks["search"].status, CheckStatus::Error);
        assert!(report.checks["search"].message.contains("Retry later"));
    }

    #[tokio::test]
    async fn test_unconfigured_job_api() {
        let search = FakeSearch::new();
        let err = Error::Config("knowledge_base_id is not set".to_string());
        let report = cmd_health(&config(), &search, Err(&err)).await;

        assert_eq!(report.status, OverallHealth::Degraded);
        assert_eq!(report.checks["knowledge_base"].status, CheckStatus::Error);
    }
}
