//! Index commands: reconcile and info

use crate::config::Config;
use crate::error::Result;
use crate::index::{IndexState, IndexVersion, ReconcileOutcome, ReconcileStatus, Reconciler};
use crate::search::{IndexMetadata, SearchAdmin};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Overrides `index.target_version`
    pub target_version: Option<String>,
    /// Overrides `index.embedding_dimension`
    pub dimension: Option<usize>,
    pub force_recreate: bool,
    /// Skip the readiness probe
    pub no_wait: bool,
}

/// Bring the configured index to the target version
pub async fn cmd_reconcile(
    config: &Config,
    admin: &dyn SearchAdmin,
    options: ReconcileOptions,
) -> Result<ReconcileOutcome> {
    let target: IndexVersion = options
        .target_version
        .as_deref()
        .unwrap_or(&config.index.target_version)
        .parse()?;
    let dimension = options.dimension.unwrap_or(config.index.embedding_dimension);

    let mut reconciler = Reconciler::new(admin, config);
    if options.no_wait {
        reconciler = reconciler.with_wait_for_ready(false);
    }

    reconciler
        .reconcile(&target, dimension, options.force_recreate)
        .await
}

fn reconcile_headline(outcome: &ReconcileOutcome) -> String {
    match outcome.status {
        ReconcileStatus::Created => "✓ Index created".to_string(),
        ReconcileStatus::Recreated => "✓ Index recreated".to_string(),
        ReconcileStatus::Exists => format!("✓ Index already at version {}", outcome.version),
    }
}

pub fn print_reconcile(outcome: &ReconcileOutcome) {
    println!("\n{}\n", reconcile_headline(outcome));
    println!("  Index: {}", outcome.index);
    println!("  Version: {}", outcome.version);
    if let Some(previous) = &outcome.previous_version {
        println!("  Previous version: {}", previous);
    } else if outcome.status == ReconcileStatus::Recreated {
        println!("  Previous version: legacy (untagged)");
    }
    if !outcome.backend_ready {
        println!("  ⚠ The collection did not answer the readiness probe in time");
    }
}

/// Index state plus what the backend reports about it
#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    pub endpoint: String,
    pub index: String,
    pub target_version: IndexVersion,
    pub up_to_date: bool,
    pub state: IndexState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<IndexMetadata>,
}

/// Read-only view of the configured index
pub async fn cmd_index_info(config: &Config, admin: &dyn SearchAdmin) -> Result<IndexInfo> {
    info!("Inspecting index {}", config.index.name);
    let target: IndexVersion = config.index.target_version.parse()?;

    let reconciler = Reconciler::new(admin, config);
    let state = reconciler.inspect().await?;

    let metadata = if state.exists {
        match admin.get_index(&config.index.name).await {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(index = %config.index.name, error = %e, "Could not read index metadata");
                None
            }
        }
    } else {
        None
    };

    Ok(IndexInfo {
        endpoint: admin.endpoint().to_string(),
        index: config.index.name.clone(),
        up_to_date: state.is_current(&target),
        target_version: target,
        state,
        metadata,
    })
}

pub fn print_index_info(info: &IndexInfo) {
    println!("\n🗂  Index {}\n", info.index);
    println!("Endpoint: {}", info.endpoint);
    println!(
        "Collection: {}",
        if info.state.is_ready {
            "✓ Reachable"
        } else {
            "✗ Not reachable"
        }
    );

    if !info.state.exists {
        println!("Index: ✗ Missing (run 'kbctl index reconcile' to create it)");
        return;
    }

    let version = info
        .state
        .version
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "legacy (untagged)".to_string());
    println!("Version: {} (target {})", version, info.target_version);
    println!(
        "Status: {}",
        if info.up_to_date {
            "✓ Up to date"
        } else {
            "⚠ Stale (next reconcile rebuilds it)"
        }
    );

    if let Some(meta) = &info.metadata {
        if let Some(dim) = meta.vector_dimension {
            println!("Vector dimension: {}", dim);
        }
        if !meta.fields.is_empty() {
            println!("Fields:");
            for (name, field_type) in &meta.fields {
                println!("  {} ({})", name, field_type);
            }
        }
        if let Some(shards) = &meta.shards {
            println!("Shards: {}", shards);
        }
        if let Some(replicas) = &meta.replicas {
            println!("Replicas: {}", replicas);
        }
    }
}
