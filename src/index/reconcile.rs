//! Index version reconciliation
//!
//! Brings the live index to a target schema version:
//!
//! - no index: create it
//! - index tagged with the target version: leave it alone
//! - any other tag, no tag, or a forced rebuild: delete, settle, create
//!
//! Every backend call goes through [`crate::retry::execute`] with its own
//! budget. Reconciliations for the same index name are assumed to be
//! serialized by the caller; a create that loses a race to another
//! reconciler is reported as `exists` only when the index it finds carries
//! the target version.

use super::probe::wait_until_ready;
use super::schema::{IndexSchema, IndexVersion, SchemaBuilder};
use super::IndexState;
use crate::config::{Config, ReconcileConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::{execute, execute_or};
use crate::search::SearchAdmin;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileStatus {
    Created,
    /// Already at the target version; nothing was changed
    Exists,
    Recreated,
}

impl fmt::Display for ReconcileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileStatus::Created => write!(f, "created"),
            ReconcileStatus::Exists => write!(f, "exists"),
            ReconcileStatus::Recreated => write!(f, "recreated"),
        }
    }
}

/// Result of one reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub index: String,
    pub status: ReconcileStatus,
    /// Version tag on the index after this call
    pub version: IndexVersion,
    /// Tag found before a rebuild (`None` for a missing or untagged index)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<IndexVersion>,
    /// False when the collection never answered the readiness probe
    pub backend_ready: bool,
}

/// Keeps one named index at the requested schema version
pub struct Reconciler<'a> {
    admin: &'a dyn SearchAdmin,
    index_name: String,
    builder: SchemaBuilder,
    retry: RetryConfig,
    timing: ReconcileConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(admin: &'a dyn SearchAdmin, config: &Config) -> Self {
        Self {
            admin,
            index_name: config.index.name.clone(),
            builder: SchemaBuilder::from_config(&config.index),
            retry: config.retry.clone(),
            timing: config.reconcile.clone(),
        }
    }

    /// Skip (or force) the readiness probe, overriding configuration
    pub fn with_wait_for_ready(mut self, wait: bool) -> Self {
        self.timing.wait_for_ready = wait;
        self
    }

    /// Poll the collection until it answers or the configured wait runs out
    pub async fn wait_for_backend(&self) -> bool {
        let admin = self.admin;
        wait_until_ready(
            || async move {
                match admin.probe_liveness().await {
                    Ok(_) => true,
                    Err(e) => {
                        debug!(error = %e, "Liveness probe failed");
                        false
                    }
                }
            },
            self.timing.probe_max_wait(),
            self.timing.probe_interval(),
        )
        .await
    }

    /// Read the current state of the index without changing anything
    pub async fn inspect(&self) -> Result<IndexState> {
        let is_ready = self.admin.probe_liveness().await.is_ok();
        let name = self.index_name.as_str();
        let exists = execute(&self.retry.exists, "index_exists", || {
            self.admin.index_exists(name)
        })
        .await?;
        if !exists {
            return Ok(IndexState::missing(is_ready));
        }
        match self.read_version().await {
            Ok(version) => Ok(IndexState {
                exists: true,
                version,
                is_ready,
            }),
            Err(Error::IndexNotFound(_)) => Ok(IndexState::missing(is_ready)),
            Err(e) => Err(e),
        }
    }

    /// Bring the index to `target_version`.
    ///
    /// Idempotent: a second call with the same target and no `force_recreate`
    /// returns `exists` and makes no destructive call.
    pub async fn reconcile(
        &self,
        target_version: &IndexVersion,
        embedding_dimension: usize,
        force_recreate: bool,
    ) -> Result<ReconcileOutcome> {
        let schema = self.builder.build(target_version, embedding_dimension);
        schema.validate()?;

        info!(
            index = %self.index_name,
            target = %target_version,
            dimension = embedding_dimension,
            force_recreate,
            "Reconciling index"
        );

        let backend_ready = if self.timing.wait_for_ready {
            let ready = self.wait_for_backend().await;
            if !ready {
                warn!(
                    index = %self.index_name,
                    "Collection did not become ready in time, proceeding anyway"
                );
            }
            ready
        } else {
            true
        };

        let mut previous_version = None;
        let mut rebuilt = false;

        if self.exists().await {
            match self.read_version().await {
                Ok(current) => {
                    if !force_recreate && current.as_ref() == Some(target_version) {
                        info!(index = %self.index_name, version = %target_version, "Index is current");
                        return Ok(ReconcileOutcome {
                            index: self.index_name.clone(),
                            status: ReconcileStatus::Exists,
                            version: target_version.clone(),
                            previous_version: None,
                            backend_ready,
                        });
                    }

                    self.log_stale(current.as_ref(), target_version, force_recreate);
                    self.delete().await?;
                    previous_version = current;
                    rebuilt = true;
                }
                Err(Error::IndexNotFound(_)) => {
                    debug!(index = %self.index_name, "Index disappeared before its version was read");
                }
                Err(e) => return Err(e),
            }
        }

        match self.create(&schema).await {
            Ok(()) => {}
            Err(Error::IndexAlreadyExists(_)) => {
                return self.lost_create_race(target_version, backend_ready).await;
            }
            Err(e) => return Err(e),
        }

        if self.timing.verify_after_create {
            self.verify(target_version).await;
        }

        let status = if rebuilt {
            ReconcileStatus::Recreated
        } else {
            ReconcileStatus::Created
        };
        info!(index = %self.index_name, version = %target_version, %status, "Index reconciled");

        Ok(ReconcileOutcome {
            index: self.index_name.clone(),
            status,
            version: target_version.clone(),
            previous_version,
            backend_ready,
        })
    }

    /// Existence with a small budget; repeated failure means "assume absent"
    async fn exists(&self) -> bool {
        let name = self.index_name.as_str();
        execute_or(&self.retry.exists, "index_exists", false, || {
            self.admin.index_exists(name)
        })
        .await
    }

    async fn read_version(&self) -> Result<Option<IndexVersion>> {
        let name = self.index_name.as_str();
        execute(&self.retry.exists, "index_version", || {
            self.admin.index_version(name)
        })
        .await
    }

    async fn delete(&self) -> Result<()> {
        let name = self.index_name.as_str();
        execute(&self.retry.delete, "delete_index", || {
            self.admin.delete_index(name)
        })
        .await?;

        let settle = self.timing.delete_settle();
        if !settle.is_zero() {
            debug!(index = %name, settle_secs = settle.as_secs(), "Waiting for deletion to propagate");
            tokio::time::sleep(settle).await;
        }
        Ok(())
    }

    async fn create(&self, schema: &IndexSchema) -> Result<()> {
        let name = self.index_name.as_str();
        execute(&self.retry.create, "create_index", || {
            self.admin.create_index(name, schema)
        })
        .await
    }

    /// Best-effort read-back; the create acknowledgment is authoritative
    async fn verify(&self, target_version: &IndexVersion) {
        let name = self.index_name.as_str();
        let settle = self.timing.create_settle();
        if !settle.is_zero() {
            debug!(index = %name, settle_secs = settle.as_secs(), "Waiting before verification");
            tokio::time::sleep(settle).await;
        }

        match execute(&self.retry.verify, "verify_index", || self.admin.get_index(name)).await {
            Ok(meta) if meta.version.as_ref() == Some(target_version) => {
                debug!(index = %name, "Index verified");
            }
            Ok(meta) => {
                warn!(
                    index = %name,
                    expected = %target_version,
                    found = ?meta.version.as_ref().map(IndexVersion::as_str),
                    "Verification read returned a different version"
                );
            }
            Err(e) => {
                warn!(index = %name, error = %e, "Index verification failed (non-fatal)");
            }
        }
    }

    /// Create was rejected because the index exists. Only an index already at
    /// the target version counts as success; anything else is a leftover of
    /// the old index (a delete that has not propagated) or a conflicting writer.
    async fn lost_create_race(
        &self,
        target_version: &IndexVersion,
        backend_ready: bool,
    ) -> Result<ReconcileOutcome> {
        let name = self.index_name.as_str();
        let stored = execute(&self.retry.verify, "index_version", || {
            self.admin.index_version(name)
        })
        .await?;

        if stored.as_ref() != Some(target_version) {
            let found = stored
                .as_ref()
                .map(IndexVersion::to_string)
                .unwrap_or_else(|| "legacy (untagged)".to_string());
            warn!(
                index = %name,
                target = %target_version,
                found = %found,
                "Create rejected and the existing index is not at the target version"
            );
            return Err(Error::VersionConflict {
                index: name.to_string(),
                found,
                target: target_version.to_string(),
            });
        }

        info!(index = %name, version = %target_version, "Index was created concurrently at the target version");
        Ok(ReconcileOutcome {
            index: self.index_name.clone(),
            status: ReconcileStatus::Exists,
            version: target_version.clone(),
            previous_version: None,
            backend_ready,
        })
    }

    fn log_stale(&self, current: Option<&IndexVersion>, target: &IndexVersion, forced: bool) {
        let found = current.map(IndexVersion::as_str).unwrap_or("legacy (untagged)");
        if forced {
            info!(index = %self.index_name, version = found, "Forced rebuild requested");
            return;
        }
        let downgrade = matches!(
            (current.and_then(IndexVersion::ordinal), target.ordinal()),
            (Some(cur), Some(tgt)) if tgt < cur
        );
        if downgrade {
            warn!(index = %self.index_name, found, target = %target, "Rebuilding index at an older version");
        } else {
            info!(index = %self.index_name, found, target = %target, "Index version is stale, rebuilding");
        }
    }
}
