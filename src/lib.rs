//! kbctl: vector index provisioning and knowledge-base readiness
//!
//! - [`index`]: schema building, readiness probing and version reconciliation
//! - [`readiness`]: folding recent ingestion jobs into a readiness verdict
//! - [`retry`]: deterministic exponential backoff for backend calls
//! - [`search`] and [`ingest`]: the external collaborators, as traits plus HTTP clients

pub mod commands;
pub mod config;
pub mod error;
pub mod index;
pub mod ingest;
pub mod progress;
pub mod readiness;
pub mod retry;
pub mod search;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
