//! Vector index lifecycle
//!
//! - [`schema`]: the target index definition and its validation
//! - [`probe`]: waiting for a freshly provisioned collection to answer
//! - [`reconcile`]: keep, create, or recreate the index for a target version

pub mod probe;
pub mod reconcile;
pub mod schema;

pub use probe::wait_until_ready;
pub use reconcile::{ReconcileOutcome, ReconcileStatus, Reconciler};
pub use schema::*;

use serde::Serialize;

/// Derived view of the live index, computed fresh on every call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexState {
    pub exists: bool,
    /// `None` when the index is missing or was created without a version tag
    pub version: Option<IndexVersion>,
    pub is_ready: bool,
}

impl IndexState {
    pub fn missing(is_ready: bool) -> Self {
        Self {
            exists: false,
            version: None,
            is_ready,
        }
    }

    /// An absent tag is the oldest version and never matches an explicit target
    pub fn is_current(&self, target: &IndexVersion) -> bool {
        self.exists && self.version.as_ref() == Some(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_index_never_current() {
        let state = IndexState {
            exists: true,
            version: None,
            is_ready: true,
        };
        assert!(!state.is_current(&IndexVersion::new("v1")));
    }

    #[test]
    fn test_current_index() {
        let state = IndexState {
            exists: true,
            version: Some(IndexVersion::new("v3")),
            is_ready: true,
        };
        assert!(state.is_current(&IndexVersion::new("v3")));
        assert!(!state.is_current(&IndexVersion::new("v4")));
        assert!(!IndexState::missing(true).is_current(&IndexVersion::new("v3")));
    }
}
