//! Vector-search collection administration
//!
//! [`SearchAdmin`] is the seam between index reconciliation and a concrete
//! backend. [`OpenSearchAdmin`] talks to an OpenSearch-compatible REST API.

mod opensearch;

pub use opensearch::*;

use crate::config::Config;
use crate::error::Result;
use crate::index::{IndexSchema, IndexVersion};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

/// Response of the liveness call
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterInfo {
    pub name: Option<String>,
    pub cluster_name: Option<String>,
    pub distribution: Option<String>,
    pub version: Option<String>,
}

/// What the backend reports about a live index
#[derive(Debug, Clone, Serialize)]
pub struct IndexMetadata {
    pub name: String,
    /// Schema version tag; `None` for indexes created without one
    pub version: Option<IndexVersion>,
    /// Mapped field name to field type
    pub fields: BTreeMap<String, String>,
    pub vector_dimension: Option<usize>,
    pub shards: Option<String>,
    pub replicas: Option<String>,
    pub created_at: Option<String>,
}

/// Administrative operations on a vector-search collection
#[async_trait]
pub trait SearchAdmin: Send + Sync {
    /// Cheap call that succeeds once the collection answers requests
    async fn probe_liveness(&self) -> Result<ClusterInfo>;

    async fn index_exists(&self, name: &str) -> Result<bool>;

    /// Create `name` from `schema`. Fails with `IndexAlreadyExists` when it is already there.
    async fn create_index(&self, name: &str, schema: &IndexSchema) -> Result<()>;

    /// Delete `name`. Deleting a missing index succeeds.
    async fn delete_index(&self, name: &str) -> Result<()>;

    /// Read the stored schema version tag
    async fn index_version(&self, name: &str) -> Result<Option<IndexVersion>>;

    async fn get_index(&self, name: &str) -> Result<IndexMetadata>;

    fn endpoint(&self) -> &str;
}

/// Build the configured search backend client
pub fn create_search_admin(config: &Config) -> Result<Box<dyn SearchAdmin>> {
    let admin = OpenSearchAdmin::new(&config.search, config.search_api_key())?;
    Ok(Box::new(admin))
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory backend that records every call

    use super::*;
    use crate::error::Error;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Probe,
        Exists(String),
        Create(String, IndexVersion),
        Delete(String),
        Version(String),
        Get(String),
    }

    impl Call {
        pub fn is_destructive(&self) -> bool {
            matches!(self, Call::Create(..) | Call::Delete(_))
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Op {
        Probe,
        Exists,
        Create,
        Delete,
        Version,
        Get,
    }

    #[derive(Default)]
    struct State {
        indexes: HashMap<String, Option<IndexVersion>>,
        calls: Vec<Call>,
        failures: HashMap<Op, VecDeque<Error>>,
        /// Index appears (with this version) right before the next create
        racing_create: Option<Option<IndexVersion>>,
    }

    #[derive(Default)]
    pub struct FakeSearch {
        state: Mutex<State>,
    }

    impl FakeSearch {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_index(self, name: &str, version: Option<&str>) -> Self {
            self.state
                .lock()
                .unwrap()
                .indexes
                .insert(name.to_string(), version.map(IndexVersion::new));
            self
        }

        /// Queue an error for the next call of `op`
        pub fn fail_next(&self, op: Op, error: Error) {
            self.state
                .lock()
                .unwrap()
                .failures
                .entry(op)
                .or_default()
                .push_back(error);
        }

        /// Simulate a concurrent reconciler creating the index first
        pub fn race_next_create(&self, version: Option<&str>) {
            self.state.lock().unwrap().racing_create = Some(version.map(IndexVersion::new));
        }

        pub fn calls(&self) -> Vec<Call> {
            self.state.lock().unwrap().calls.clone()
        }

        pub fn destructive_calls(&self) -> usize {
            self.calls().iter().filter(|c| c.is_destructive()).count()
        }

        pub fn clear_calls(&self) {
            self.state.lock().unwrap().calls.clear();
        }

        pub fn stored_version(&self, name: &str) -> Option<IndexVersion> {
            self.state
                .lock()
                .unwrap()
                .indexes
                .get(name)
                .cloned()
                .flatten()
        }

        pub fn has_index(&self, name: &str) -> bool {
            self.state.lock().unwrap().indexes.contains_key(name)
        }

        fn record(&self, op: Op, call: Call) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            match state.failures.get_mut(&op).and_then(|q| q.pop_front()) {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl SearchAdmin for FakeSearch {
        async fn probe_liveness(&self) -> Result<ClusterInfo> {
            self.record(Op::Probe, Call::Probe)?;
            Ok(ClusterInfo {
                name: Some("fake".to_string()),
                ..Default::default()
            })
        }

        async fn index_exists(&self, name: &str) -> Result<bool> {
            self.record(Op::Exists, Call::Exists(name.to_string()))?;
            Ok(self.has_index(name))
        }

        async fn create_index(&self, name: &str, schema: &IndexSchema) -> Result<()> {
            self.record(
                Op::Create,
                Call::Create(name.to_string(), schema.version.clone()),
            )?;
            schema.validate()?;
            let mut state = self.state.lock().unwrap();
            if let Some(version) = state.racing_create.take() {
                state.indexes.insert(name.to_string(), version);
            }
            if state.indexes.contains_key(name) {
                return Err(Error::IndexAlreadyExists(name.to_string()));
            }
            state
                .indexes
                .insert(name.to_string(), Some(schema.version.clone()));
            Ok(())
        }

        async fn delete_index(&self, name: &str) -> Result<()> {
            self.record(Op::Delete, Call::Delete(name.to_string()))?;
            self.state.lock().unwrap().indexes.remove(name);
            Ok(())
        }

        async fn index_version(&self, name: &str) -> Result<Option<IndexVersion>> {
            self.record(Op::Version, Call::Version(name.to_string()))?;
            let state = self.state.lock().unwrap();
            match state.indexes.get(name) {
                Some(version) => Ok(version.clone()),
                None => Err(Error::IndexNotFound(name.to_string())),
            }
        }

        async fn get_index(&self, name: &str) -> Result<IndexMetadata> {
            self.record(Op::Get, Call::Get(name.to_string()))?;
            let state = self.state.lock().unwrap();
            let version = state
                .indexes
                .get(name)
                .cloned()
                .ok_or_else(|| Error::IndexNotFound(name.to_string()))?;
            Ok(IndexMetadata {
                name: name.to_string(),
                version,
                fields: BTreeMap::new(),
                vector_dimension: None,
                shards: None,
                replicas: None,
                created_at: None,
            })
        }

        fn endpoint(&self) -> &str {
            "fake://search"
        }
    }
}
