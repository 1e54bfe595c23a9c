//! triage-core
//!
//! Shared domain types, the error taxonomy, collaborator traits and the
//! ingestion-side chunker for the incident-triage evidence pipeline.

pub mod chunker;
pub mod config;
pub mod error;
pub mod ingest;
pub mod row;
pub mod telemetry;
pub mod testing;
pub mod traits;
pub mod types;

pub use error::{Error, ExternalCallError, Result};
